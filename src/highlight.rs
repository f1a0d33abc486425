//! Highlight anchors and inline marker reconstruction.
//!
//! A highlight is anchored by character offsets into its chapter's flattened
//! text, independent of markup. That makes anchors precise but fragile: any
//! change to the chapter's underlying text invalidates every highlight in
//! that chapter, and no diff-based re-anchoring is attempted. The whole
//! chapter is the addressable unit; per-block anchoring would be more robust
//! but would break existing records.
//!
//! Reconstruction parses the chapter markup, walks its text nodes with
//! cumulative offsets, and wraps the intersecting ranges in `<mark>`
//! elements. Highlights are applied in descending start-offset order so that
//! earlier insertions never shift the offsets of ranges still to be applied.

use std::cell::RefCell;

use html5ever::tendril::StrTendril;
use html5ever::{Attribute, LocalName, QualName, namespace_url, ns};
use markup5ever_rcdom::{Handle, Node, NodeData};
use serde::{Deserialize, Serialize};

use crate::chapter::Chapter;
use crate::dom;

/// Minimum selection length (in characters) that can become a highlight.
pub const MIN_SELECTION_CHARS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Yellow,
    Green,
    Blue,
    Pink,
}

impl Color {
    pub fn as_str(self) -> &'static str {
        match self {
            Color::Yellow => "yellow",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Pink => "pink",
        }
    }
}

/// A persisted highlight/annotation anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub id: String,
    /// Id of the owning chapter.
    pub chapter_id: String,
    /// Character offset of the selection start in the chapter's flat text.
    pub start_offset: usize,
    /// Exclusive end offset; always greater than `start_offset`.
    pub end_offset: usize,
    /// Verbatim snapshot of the selected text at creation time.
    pub selected_text: String,
    pub color: Color,
    pub memo: Option<String>,
    /// Virtual page number when the highlight was created. Display metadata
    /// only — navigation re-resolves the offset against current geometry.
    pub page_number: usize,
}

/// Anchor a selection within one chapter.
///
/// Returns `None` for selections that are too short or out of range. The
/// snapshot text is taken from the chapter's flat text, not from the caller,
/// so it is guaranteed to reproduce on re-render while the text is
/// unchanged.
pub fn anchor_selection(
    chapter: &Chapter,
    start_offset: usize,
    len: usize,
    color: Color,
    virtual_page: usize,
) -> Option<Highlight> {
    if len < MIN_SELECTION_CHARS {
        return None;
    }
    let flat = chapter.flat_text();
    let total = flat.chars().count();
    if start_offset + len > total {
        return None;
    }

    let selected: String = flat.chars().skip(start_offset).take(len).collect();
    Some(Highlight {
        id: crate::util::fresh_id("hl"),
        chapter_id: chapter.id.clone(),
        start_offset,
        end_offset: start_offset + len,
        selected_text: selected,
        color,
        memo: None,
        page_number: virtual_page,
    })
}

/// Re-render chapter markup with inline markers for every highlight.
///
/// A highlight spanning several text nodes becomes several `<mark>`
/// fragments, each carrying the highlight id and color. Input markup is
/// never mutated in place; each render pass starts from the pristine
/// chapter content.
pub fn apply_highlights(markup: &str, highlights: &[Highlight]) -> String {
    if highlights.is_empty() {
        return markup.to_string();
    }

    let (_dom, body) = dom::parse_fragment(markup);

    let mut sorted: Vec<&Highlight> = highlights.iter().collect();
    sorted.sort_by(|a, b| b.start_offset.cmp(&a.start_offset));

    for hl in sorted {
        // Re-enumerate each round: earlier wraps changed the node list, and
        // descending order keeps remaining offsets valid.
        let nodes = dom::text_nodes(&body);
        for node_ref in nodes.iter().rev() {
            let node_end = node_ref.start + node_ref.len;
            if node_end <= hl.start_offset || node_ref.start >= hl.end_offset {
                continue;
            }
            let local_start = hl.start_offset.saturating_sub(node_ref.start);
            let local_end = (hl.end_offset - node_ref.start).min(node_ref.len);
            if local_start >= local_end {
                continue;
            }
            wrap_text_range(&body, &node_ref.node, local_start, local_end, hl);
        }
    }

    dom::serialize_children(&body)
}

/// Remove every highlight marker, hoisting marked text back in place.
/// Inverse of [`apply_highlights`] over the flattened text.
pub fn strip_marks(markup: &str) -> String {
    let (_dom, body) = dom::parse_fragment(markup);
    unwrap_marks(&body);
    dom::serialize_children(&body)
}

/// Flattened text content of a markup string — the offset space highlights
/// anchor into.
pub fn flatten_markup(markup: &str) -> String {
    let (_dom, body) = dom::parse_fragment(markup);
    dom::text_content(&body)
}

/// Split `node`'s text at the char range and wrap the middle in a marker.
fn wrap_text_range(root: &Handle, node: &Handle, start: usize, end: usize, hl: &Highlight) {
    let NodeData::Text { ref contents } = node.data else {
        return;
    };
    let text = contents.borrow().to_string();

    let byte_start = char_to_byte(&text, start);
    let byte_end = char_to_byte(&text, end);
    let (pre, mid, post) = (&text[..byte_start], &text[byte_start..byte_end], &text[byte_end..]);

    let Some((parent, index)) = find_parent(root, node) else {
        return;
    };

    let mut replacement: Vec<Handle> = Vec::with_capacity(3);
    if !pre.is_empty() {
        replacement.push(text_node(pre));
    }
    replacement.push(mark_node(hl, mid));
    if !post.is_empty() {
        replacement.push(text_node(post));
    }

    parent
        .children
        .borrow_mut()
        .splice(index..index + 1, replacement);
}

fn unwrap_marks(handle: &Handle) {
    let kids: Vec<Handle> = handle.children.borrow().clone();
    let mut rebuilt: Vec<Handle> = Vec::with_capacity(kids.len());
    for child in kids {
        unwrap_marks(&child);
        if is_mark(&child) {
            rebuilt.extend(child.children.borrow().iter().cloned());
        } else {
            rebuilt.push(child);
        }
    }
    *handle.children.borrow_mut() = rebuilt;
}

fn is_mark(handle: &Handle) -> bool {
    dom::element_name(handle).as_deref() == Some("mark")
        && dom::get_attribute(handle, "data-hl-id").is_some()
}

fn find_parent(root: &Handle, target: &Handle) -> Option<(Handle, usize)> {
    for (i, child) in root.children.borrow().iter().enumerate() {
        if std::rc::Rc::ptr_eq(child, target) {
            return Some((root.clone(), i));
        }
        if let Some(found) = find_parent(child, target) {
            return Some(found);
        }
    }
    None
}

fn char_to_byte(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

fn text_node(s: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from(s)),
    })
}

fn mark_node(hl: &Highlight, text: &str) -> Handle {
    let attrs = vec![
        Attribute {
            name: QualName::new(None, ns!(), LocalName::from("data-hl-id")),
            value: StrTendril::from(hl.id.as_str()),
        },
        Attribute {
            name: QualName::new(None, ns!(), LocalName::from("data-hl-color")),
            value: StrTendril::from(hl.color.as_str()),
        },
    ];
    let node = Node::new(NodeData::Element {
        name: QualName::new(None, ns!(html), LocalName::from("mark")),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    });
    node.children.borrow_mut().push(text_node(text));
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hl(id: &str, start: usize, end: usize, color: Color) -> Highlight {
        Highlight {
            id: id.to_string(),
            chapter_id: "ch001".to_string(),
            start_offset: start,
            end_offset: end,
            selected_text: String::new(),
            color,
            memo: None,
            page_number: 1,
        }
    }

    #[test]
    fn test_no_highlights_is_identity() {
        let markup = "<h1>제목</h1><p>본문</p>";
        assert_eq!(apply_highlights(markup, &[]), markup);
    }

    #[test]
    fn test_single_highlight_within_one_node() {
        let markup = "<p>0123456789</p>";
        let out = apply_highlights(markup, &[hl("a", 2, 5, Color::Yellow)]);
        assert!(out.contains(r#"<mark data-hl-id="a" data-hl-color="yellow">234</mark>"#));
        assert_eq!(flatten_markup(&out), "0123456789");
    }

    #[test]
    fn test_highlight_spanning_nodes_fragments() {
        // "abc" | "def" across two paragraphs; [2,4) covers "c" and "d".
        let markup = "<p>abc</p><p>def</p>";
        let out = apply_highlights(markup, &[hl("x", 2, 4, Color::Blue)]);
        assert_eq!(out.matches("data-hl-id=\"x\"").count(), 2);
        assert_eq!(flatten_markup(&out), "abcdef");
    }

    #[test]
    fn test_overlapping_highlights_preserve_text() {
        let markup = "<p>가나다라마바사아자차</p>";
        let hls = vec![hl("one", 1, 6, Color::Yellow), hl("two", 4, 9, Color::Green)];
        let out = apply_highlights(markup, &hls);
        assert_eq!(flatten_markup(&out), "가나다라마바사아자차");
        assert_eq!(flatten_markup(&strip_marks(&out)), "가나다라마바사아자차");
        assert!(out.contains("data-hl-id=\"one\""));
        assert!(out.contains("data-hl-id=\"two\""));
    }

    #[test]
    fn test_strip_marks_roundtrip() {
        let markup = "<h2>소제목</h2><p>강조할 문장이 여기 있다.</p>";
        let flat = flatten_markup(markup);
        let out = apply_highlights(markup, &[hl("m", 3, 8, Color::Pink)]);
        let stripped = strip_marks(&out);
        assert_eq!(flatten_markup(&stripped), flat);
        assert!(!stripped.contains("<mark"));
    }

    #[test]
    fn test_highlight_inside_link_keeps_link() {
        let markup = r#"<p>앞 <a href="https://example.com">링크글</a> 뒤</p>"#;
        let flat = flatten_markup(markup);
        // "링크글" starts after "앞 " (2 chars).
        let out = apply_highlights(markup, &[hl("L", 2, 5, Color::Yellow)]);
        assert!(out.contains("<a href="));
        assert!(out.contains("<mark"));
        assert_eq!(flatten_markup(&out), flat);
    }
}
