//! HTML parsing helpers shared by chapter extraction, Nav TOC parsing, and
//! highlight reconstruction. Thin layer over html5ever's RcDom.

use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::{ParseOpts, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

/// Parse a full HTML/XHTML document into a DOM tree.
pub fn parse_html(html: &str) -> RcDom {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: true,
            ..Default::default()
        },
        ..Default::default()
    };

    parse_document(RcDom::default(), opts)
        .from_utf8()
        .one(html.as_bytes())
}

/// Parse a markup fragment (no doctype/head) and return the body handle.
pub fn parse_fragment(markup: &str) -> (RcDom, Handle) {
    let wrapped = format!("<!DOCTYPE html><html><head></head><body>{markup}</body></html>");
    let dom = parse_html(&wrapped);
    let body = find_first_element(&dom.document, "body").expect("parser always builds a body");
    (dom, body)
}

/// Serialize a node and its children to markup.
pub fn serialize_node(handle: &Handle) -> String {
    let mut bytes = Vec::new();
    let serializable: SerializableHandle = handle.clone().into();

    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };

    if serialize(&mut bytes, &serializable, opts).is_err() {
        return String::new();
    }
    String::from_utf8(bytes).unwrap_or_default()
}

/// Serialize only the children of a node, concatenated.
pub fn serialize_children(handle: &Handle) -> String {
    handle
        .children
        .borrow()
        .iter()
        .map(serialize_node)
        .collect()
}

/// Depth-first search for the first element with the given local name.
pub fn find_first_element(handle: &Handle, name: &str) -> Option<Handle> {
    if let NodeData::Element { name: ref qname, .. } = handle.data
        && qname.local.as_ref() == name
    {
        return Some(handle.clone());
    }

    for child in handle.children.borrow().iter() {
        if let Some(found) = find_first_element(child, name) {
            return Some(found);
        }
    }

    None
}

/// Element local name, or `None` for non-element nodes.
pub fn element_name(handle: &Handle) -> Option<String> {
    match handle.data {
        NodeData::Element { ref name, .. } => Some(name.local.as_ref().to_string()),
        _ => None,
    }
}

/// Get an attribute value from an element.
pub fn get_attribute(handle: &Handle, attr_name: &str) -> Option<String> {
    if let NodeData::Element { ref attrs, .. } = handle.data {
        for attr in attrs.borrow().iter() {
            if attr.name.local.as_ref() == attr_name {
                return Some(attr.value.to_string());
            }
        }
    }
    None
}

/// Concatenated text content of a node, ignoring tags.
pub fn text_content(handle: &Handle) -> String {
    let mut text = String::new();
    collect_text(handle, &mut text);
    text
}

fn collect_text(handle: &Handle, text: &mut String) {
    match handle.data {
        NodeData::Text { ref contents } => text.push_str(&contents.borrow()),
        NodeData::Element { .. } | NodeData::Document => {
            for child in handle.children.borrow().iter() {
                collect_text(child, text);
            }
        }
        _ => {}
    }
}

/// A text node together with its cumulative character offset within the
/// walked subtree's flattened text.
pub struct TextNodeRef {
    pub node: Handle,
    /// Character (not byte) offset of this node's first character.
    pub start: usize,
    /// Character length of this node's content.
    pub len: usize,
}

/// Enumerate text nodes in document order with cumulative character offsets.
///
/// This is the "flattened text + node index" structure that anchors character
/// offsets independently of markup.
pub fn text_nodes(root: &Handle) -> Vec<TextNodeRef> {
    let mut nodes = Vec::new();
    let mut offset = 0usize;
    walk_text_nodes(root, &mut nodes, &mut offset);
    nodes
}

fn walk_text_nodes(handle: &Handle, nodes: &mut Vec<TextNodeRef>, offset: &mut usize) {
    match handle.data {
        NodeData::Text { ref contents } => {
            let len = contents.borrow().chars().count();
            nodes.push(TextNodeRef {
                node: handle.clone(),
                start: *offset,
                len,
            });
            *offset += len;
        }
        NodeData::Element { .. } | NodeData::Document => {
            for child in handle.children.borrow().iter() {
                walk_text_nodes(child, nodes, offset);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_roundtrip_text() {
        let (_dom, body) = parse_fragment("<h1>제목</h1><p>본문 텍스트</p>");
        assert_eq!(text_content(&body), "제목본문 텍스트");
    }

    #[test]
    fn test_text_nodes_offsets() {
        let (_dom, body) = parse_fragment("<p>ab</p><p>c<em>de</em></p>");
        let nodes = text_nodes(&body);
        let offsets: Vec<(usize, usize)> = nodes.iter().map(|n| (n.start, n.len)).collect();
        assert_eq!(offsets, vec![(0, 2), (2, 1), (3, 2)]);
    }

    #[test]
    fn test_get_attribute() {
        let (_dom, body) = parse_fragment(r#"<a href="https://example.com">x</a>"#);
        let a = find_first_element(&body, "a").unwrap();
        assert_eq!(get_attribute(&a, "href").as_deref(), Some("https://example.com"));
    }

    #[test]
    fn test_entities_decode_to_text() {
        let (_dom, body) = parse_fragment("<p>a &amp; b</p>");
        assert_eq!(text_content(&body), "a & b");
    }
}
