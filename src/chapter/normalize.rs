//! Source markup normalization.
//!
//! Arbitrary content-document markup is rewritten into the flat block model:
//! headings, paragraphs, rules, and images. Authoring presentation (style
//! blocks, inline styles, fonts, colors) is dropped wholesale so content
//! inherits the viewer's theme. Internal hyperlinks are neutralized to plain
//! text; external links survive as functional spans.

use log::debug;
use markup5ever_rcdom::{Handle, NodeData};

use crate::dom;
use crate::image::ImageStore;
use crate::package::path::resolve_href;

use super::{BlockKind, ContentBlock, InlineLink, segment};

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "blockquote", "li", "dd", "dt", "figcaption", "pre",
];

/// Normalize a parsed body into the flat block sequence.
///
/// `source_path` is the archive path of the content document; image
/// references resolve against its directory. Oversized unsegmented
/// paragraphs are auto-split before the blocks are returned.
pub fn normalize_body(body: &Handle, source_path: &str, images: &ImageStore) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    let mut run = InlineRun::default();

    for child in body.children.borrow().iter() {
        walk(child, source_path, images, &mut blocks, &mut run);
    }
    run.flush(&mut blocks);

    split_oversized(blocks)
}

fn walk(
    handle: &Handle,
    source_path: &str,
    images: &ImageStore,
    blocks: &mut Vec<ContentBlock>,
    run: &mut InlineRun,
) {
    match handle.data {
        NodeData::Text { ref contents } => {
            run.push_text(&contents.borrow());
        }
        NodeData::Element { ref name, .. } => {
            let tag = name.local.as_ref();
            match tag {
                "script" | "style" | "head" | "link" => {}
                "h1" => flush_heading(handle, BlockKind::Heading1, blocks, run),
                "h2" => flush_heading(handle, BlockKind::Heading2, blocks, run),
                "h3" | "h4" | "h5" | "h6" => flush_heading(handle, BlockKind::Heading3, blocks, run),
                "hr" => {
                    run.flush(blocks);
                    blocks.push(ContentBlock::rule());
                }
                "img" | "image" => {
                    emit_image(handle, source_path, images, blocks, run);
                }
                "br" => run.push_text(" "),
                "a" => collect_link(handle, source_path, images, blocks, run),
                _ if BLOCK_TAGS.contains(&tag) => {
                    run.flush(blocks);
                    if has_heading(handle) {
                        // Container wrapping headings: recurse so the
                        // headings keep their own blocks.
                        for child in handle.children.borrow().iter() {
                            walk(child, source_path, images, blocks, run);
                        }
                        run.flush(blocks);
                    } else {
                        let mut inner = InlineRun::default();
                        for child in handle.children.borrow().iter() {
                            walk(child, source_path, images, blocks, &mut inner);
                        }
                        inner.flush(blocks);
                    }
                }
                // Unknown and inline elements contribute their children.
                _ => {
                    for child in handle.children.borrow().iter() {
                        walk(child, source_path, images, blocks, run);
                    }
                }
            }
        }
        _ => {}
    }
}

fn flush_heading(handle: &Handle, kind: BlockKind, blocks: &mut Vec<ContentBlock>, run: &mut InlineRun) {
    run.flush(blocks);
    let text = collapse_whitespace(&dom::text_content(handle));
    let text = text.trim();
    if !text.is_empty() {
        blocks.push(ContentBlock::text_block(kind, text));
    }
}

fn emit_image(
    handle: &Handle,
    source_path: &str,
    images: &ImageStore,
    blocks: &mut Vec<ContentBlock>,
    run: &mut InlineRun,
) {
    let src = dom::get_attribute(handle, "src")
        .or_else(|| dom::get_attribute(handle, "href"))
        .unwrap_or_default();
    if src.is_empty() || src.starts_with("http") || src.starts_with("data:") {
        return;
    }

    let resolved = resolve_href(source_path, &src);
    let path = if images.contains(&resolved) {
        Some(resolved)
    } else {
        percent_encoding::percent_decode_str(&resolved)
            .decode_utf8()
            .ok()
            .map(|s| s.into_owned())
            .filter(|decoded| images.contains(decoded))
    };

    match path {
        Some(path) => {
            run.flush(blocks);
            blocks.push(ContentBlock::image(path));
        }
        // Unresolvable references are dropped without erroring the chapter.
        None => debug!("dropping unresolved image reference: {src}"),
    }
}

/// External links keep their target; internal links collapse to plain text
/// since there is no intra-document navigation model.
fn collect_link(
    handle: &Handle,
    source_path: &str,
    images: &ImageStore,
    blocks: &mut Vec<ContentBlock>,
    run: &mut InlineRun,
) {
    let href = dom::get_attribute(handle, "href").unwrap_or_default();
    let external = href.starts_with("http://") || href.starts_with("https://") || href.starts_with("mailto:");

    if !external {
        for child in handle.children.borrow().iter() {
            walk(child, source_path, images, blocks, run);
        }
        return;
    }

    let start = run.char_len();
    for child in handle.children.borrow().iter() {
        walk(child, source_path, images, blocks, run);
    }
    let end = run.char_len();
    if end > start {
        run.links.push(InlineLink { start, end, href });
    }
}

fn has_heading(handle: &Handle) -> bool {
    if let Some(name) = dom::element_name(handle)
        && matches!(name.as_str(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
    {
        return true;
    }
    handle.children.borrow().iter().any(has_heading)
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_space && !out.is_empty() {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out
}

/// Accumulates an inline text run (with link spans) until a block boundary.
#[derive(Default)]
struct InlineRun {
    text: String,
    links: Vec<InlineLink>,
    len: usize,
}

impl InlineRun {
    fn push_text(&mut self, s: &str) {
        for c in s.chars() {
            if c.is_whitespace() {
                if !self.text.is_empty() && !self.text.ends_with(' ') {
                    self.text.push(' ');
                    self.len += 1;
                }
            } else {
                self.text.push(c);
                self.len += 1;
            }
        }
    }

    fn char_len(&self) -> usize {
        self.len
    }

    fn flush(&mut self, blocks: &mut Vec<ContentBlock>) {
        let trimmed_len = self.text.trim_end().chars().count();
        if trimmed_len == 0 {
            self.text.clear();
            self.links.clear();
            self.len = 0;
            return;
        }

        let text: String = self.text.chars().take(trimmed_len).collect();
        let mut links = std::mem::take(&mut self.links);
        links.retain(|l| l.start < trimmed_len);
        for link in &mut links {
            link.end = link.end.min(trimmed_len);
        }

        blocks.push(ContentBlock {
            kind: BlockKind::Paragraph,
            text,
            links,
            image: None,
        });
        self.text.clear();
        self.len = 0;
    }
}

/// Apply the paragraph auto-split heuristic to oversized paragraphs.
fn split_oversized(blocks: Vec<ContentBlock>) -> Vec<ContentBlock> {
    let mut out = Vec::with_capacity(blocks.len());
    for block in blocks {
        if block.kind == BlockKind::Paragraph
            && block.links.is_empty()
            && block.text.chars().count() >= segment::SPLIT_THRESHOLD
        {
            for part in segment::split_paragraph(&block.text) {
                out.push(ContentBlock::text_block(BlockKind::Paragraph, part));
            }
        } else {
            out.push(block);
        }
    }
    out
}
