mod normalize;
pub mod segment;

pub use normalize::normalize_body;

use crate::dom;
use crate::image::ImageStore;
use crate::util::escape_markup;

/// Kind of a normalized content block.
///
/// Source heading levels collapse to three: h1 stays, h2 stays, h3–h6 all
/// become the third level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Heading1,
    Heading2,
    Heading3,
    Paragraph,
    Rule,
    Image,
}

/// An external hyperlink span within a block's text, in character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineLink {
    pub start: usize,
    pub end: usize,
    pub href: String,
}

/// One flat semantic block produced by normalization. Consumed to build the
/// chapter's flattened markup and to measure layout extents.
#[derive(Debug, Clone)]
pub struct ContentBlock {
    pub kind: BlockKind,
    /// Text content; empty for `Rule` and `Image` blocks.
    pub text: String,
    /// External links preserved functional within a paragraph.
    pub links: Vec<InlineLink>,
    /// Archive path of the resolved image handle, for `Image` blocks.
    pub image: Option<String>,
}

impl ContentBlock {
    pub fn text_block(kind: BlockKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            links: Vec::new(),
            image: None,
        }
    }

    pub fn rule() -> Self {
        Self {
            kind: BlockKind::Rule,
            text: String::new(),
            links: Vec::new(),
            image: None,
        }
    }

    pub fn image(path: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Image,
            text: String::new(),
            links: Vec::new(),
            image: Some(path.into()),
        }
    }
}

/// One extracted chapter. Immutable after extraction.
#[derive(Debug, Clone)]
pub struct Chapter {
    /// Manifest id of the source spine entry.
    pub id: String,
    /// Archive path of the source content document.
    pub source_path: String,
    /// Derived display title.
    pub title: String,
    /// Normalized content as a single flattened markup string — the one
    /// addressable text unit for highlight anchors.
    pub content: String,
    /// Position in reading order (0-based).
    pub index: usize,
    blocks: Vec<ContentBlock>,
}

impl Chapter {
    /// The normalized block sequence behind `content`. Retained so layout can
    /// measure block extents without re-parsing markup.
    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    /// The chapter's flattened text: every block's text concatenated in
    /// document order, independent of markup. Highlight offsets index into
    /// this string (by character) and stay valid only while it is unchanged.
    pub fn flat_text(&self) -> String {
        self.blocks.iter().map(|b| b.text.as_str()).collect()
    }

    /// Character length of the flattened text.
    pub fn flat_len(&self) -> usize {
        self.blocks.iter().map(|b| b.text.chars().count()).sum()
    }
}

const TITLE_HEADING_CAP: usize = 60;
const TITLE_BODY_CAP: usize = 50;

/// Extract one chapter from a content document.
///
/// Returns `None` when the chapter yields no text and no graphic content —
/// cover pages and spacer documents are dropped entirely rather than shown
/// as blank pages.
pub fn extract(
    id: &str,
    source_path: &str,
    html: &str,
    images: &ImageStore,
    index: usize,
) -> Option<Chapter> {
    let parsed = dom::parse_html(html);
    let body = dom::find_first_element(&parsed.document, "body")?;

    let blocks = normalize_body(&body, source_path, images);

    let has_text = blocks
        .iter()
        .map(|b| b.text.chars().filter(|c| !c.is_whitespace()).count())
        .sum::<usize>()
        >= 3;
    let has_graphic = blocks.iter().any(|b| b.kind == BlockKind::Image);
    if !has_text && !has_graphic {
        return None;
    }

    let title = derive_title(&blocks).unwrap_or_else(|| format!("Chapter {}", index + 1));
    let content = render_markup(&blocks);

    Some(Chapter {
        id: id.to_string(),
        source_path: source_path.to_string(),
        title,
        content,
        index,
        blocks,
    })
}

/// First heading's text (trimmed, capped), else the first ~50 characters of
/// body text.
fn derive_title(blocks: &[ContentBlock]) -> Option<String> {
    let heading = blocks.iter().find(|b| {
        matches!(
            b.kind,
            BlockKind::Heading1 | BlockKind::Heading2 | BlockKind::Heading3
        ) && !b.text.trim().is_empty()
    });
    if let Some(h) = heading {
        return Some(truncate_chars(h.text.trim(), TITLE_HEADING_CAP, false));
    }

    let body = blocks
        .iter()
        .find(|b| b.kind == BlockKind::Paragraph && !b.text.trim().is_empty())?;
    Some(truncate_chars(body.text.trim(), TITLE_BODY_CAP, true))
}

fn truncate_chars(text: &str, cap: usize, ellipsis: bool) -> String {
    if text.chars().count() <= cap {
        return text.to_string();
    }
    let mut out: String = text.chars().take(cap).collect();
    if ellipsis {
        out.push_str("...");
    }
    out
}

/// Render the block sequence to the chapter's flattened markup string.
///
/// No whitespace is emitted between tags: the markup's flattened text
/// content must equal the concatenation of block texts exactly, since
/// highlight offsets are defined over it.
fn render_markup(blocks: &[ContentBlock]) -> String {
    let mut out = String::new();
    for block in blocks {
        match block.kind {
            BlockKind::Heading1 => tagged(&mut out, "h1", block),
            BlockKind::Heading2 => tagged(&mut out, "h2", block),
            BlockKind::Heading3 => tagged(&mut out, "h3", block),
            BlockKind::Paragraph => tagged(&mut out, "p", block),
            BlockKind::Rule => out.push_str("<hr>"),
            BlockKind::Image => {
                if let Some(path) = &block.image {
                    out.push_str(&format!("<img src=\"res:{}\">", escape_markup(path)));
                }
            }
        }
    }
    out
}

fn tagged(out: &mut String, tag: &str, block: &ContentBlock) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    push_text_with_links(out, &block.text, &block.links);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn push_text_with_links(out: &mut String, text: &str, links: &[InlineLink]) {
    if links.is_empty() {
        out.push_str(&escape_markup(text));
        return;
    }

    let chars: Vec<char> = text.chars().collect();
    let mut pos = 0usize;
    for link in links {
        if link.start > pos {
            let run: String = chars[pos..link.start].iter().collect();
            out.push_str(&escape_markup(&run));
        }
        let label: String = chars[link.start..link.end.min(chars.len())].iter().collect();
        out.push_str(&format!(
            "<a href=\"{}\">{}</a>",
            escape_markup(&link.href),
            escape_markup(&label)
        ));
        pos = link.end.min(chars.len());
    }
    if pos < chars.len() {
        let run: String = chars[pos..].iter().collect();
        out.push_str(&escape_markup(&run));
    }
}
