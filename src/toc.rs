//! Table-of-contents resolution.
//!
//! Handles both TOC formats found in the wild: the legacy NCX document
//! (EPUB 2) and the navigation document (EPUB 3). Both are flattened into a
//! single ordered list with nesting levels, then matched against extracted
//! chapters by path suffix, since package documents and TOC documents rarely
//! agree on relative-path conventions.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::chapter::Chapter;
use crate::dom;
use crate::error::{Error, Result};
use crate::package::path::{resolve_href, strip_fragment};

/// One table-of-contents row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub title: String,
    /// Archive-root path of the target document.
    pub href: String,
    pub fragment: Option<String>,
    /// Nesting depth, 0 for top-level entries.
    pub level: usize,
    /// Index of the matched chapter, `None` until resolved.
    pub chapter_index: Option<usize>,
}

/// Parse a legacy NCX document into a flat, document-ordered entry list.
///
/// `ncx_path` is the archive path of the NCX itself; entry hrefs resolve
/// against it.
pub fn parse_ncx(content: &str, ncx_path: &str) -> Result<Vec<TocEntry>> {
    struct Frame {
        title: Option<String>,
        src: Option<String>,
        emitted: bool,
    }

    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut in_text = false;

    // Emits the top frame once it has both a label and a target, keeping
    // parents ahead of their children in the output.
    fn try_emit(stack: &mut [Frame], entries: &mut Vec<TocEntry>, ncx_path: &str) {
        let level = stack.len().saturating_sub(1);
        if let Some(frame) = stack.last_mut()
            && !frame.emitted
            && let (Some(title), Some(src)) = (frame.title.as_ref(), frame.src.as_ref())
        {
            let (path, fragment) = strip_fragment(src);
            entries.push(TocEntry {
                title: title.clone(),
                href: resolve_href(ncx_path, path),
                fragment: fragment.map(str::to_string),
                level,
                chapter_index: None,
            });
            frame.emitted = true;
        }
    }

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"navPoint" => stack.push(Frame {
                    title: None,
                    src: None,
                    emitted: false,
                }),
                b"text" => in_text = !stack.is_empty(),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if local_name(e.name().as_ref()) == b"content" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"src"
                            && let Some(frame) = stack.last_mut()
                        {
                            frame.src = Some(String::from_utf8(attr.value.to_vec())?);
                        }
                    }
                    try_emit(&mut stack, &mut entries, ncx_path);
                }
            }
            Ok(Event::Text(e)) => {
                if in_text && let Some(frame) = stack.last_mut() {
                    let raw = String::from_utf8_lossy(e.as_ref());
                    match &mut frame.title {
                        Some(existing) => existing.push_str(&raw),
                        None => frame.title = Some(raw.into_owned()),
                    }
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_text && let Some(frame) = stack.last_mut() {
                    let resolved = match String::from_utf8_lossy(e.as_ref()).as_ref() {
                        "apos" => "'",
                        "quot" => "\"",
                        "lt" => "<",
                        "gt" => ">",
                        "amp" => "&",
                        _ => "",
                    };
                    match &mut frame.title {
                        Some(existing) => existing.push_str(resolved),
                        None => frame.title = Some(resolved.to_string()),
                    }
                }
            }
            Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                b"text" => {
                    in_text = false;
                    try_emit(&mut stack, &mut entries, ncx_path);
                }
                b"navPoint" => {
                    try_emit(&mut stack, &mut entries, ncx_path);
                    stack.pop();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Ok(entries)
}

/// Parse an EPUB 3 navigation document into a flat, document-ordered entry
/// list. Prefers the `nav` element typed "toc"; falls back to the first
/// `nav` in the document.
pub fn parse_nav(content: &str, nav_path: &str) -> Vec<TocEntry> {
    let dom = dom::parse_html(content);

    let nav = find_toc_nav(&dom.document);
    let Some(nav) = nav else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    if let Some(ol) = dom::find_first_element(&nav, "ol") {
        walk_list(&ol, 0, nav_path, &mut entries);
    }
    entries
}

fn find_toc_nav(root: &markup5ever_rcdom::Handle) -> Option<markup5ever_rcdom::Handle> {
    let mut navs = Vec::new();
    collect_navs(root, &mut navs);
    navs.iter()
        .find(|nav| {
            dom::get_attribute(nav, "epub:type").is_some_and(|t| t.split_whitespace().any(|w| w == "toc"))
        })
        .or_else(|| navs.first())
        .cloned()
}

fn collect_navs(handle: &markup5ever_rcdom::Handle, out: &mut Vec<markup5ever_rcdom::Handle>) {
    if dom::element_name(handle).as_deref() == Some("nav") {
        out.push(handle.clone());
    }
    for child in handle.children.borrow().iter() {
        collect_navs(child, out);
    }
}

fn walk_list(
    ol: &markup5ever_rcdom::Handle,
    level: usize,
    nav_path: &str,
    entries: &mut Vec<TocEntry>,
) {
    for li in ol.children.borrow().iter() {
        if dom::element_name(li).as_deref() != Some("li") {
            continue;
        }

        for child in li.children.borrow().iter() {
            match dom::element_name(child).as_deref() {
                Some("a") => {
                    let title = dom::text_content(child).trim().to_string();
                    let href = dom::get_attribute(child, "href").unwrap_or_default();
                    if !title.is_empty() && !href.is_empty() {
                        let (path, fragment) = strip_fragment(&href);
                        entries.push(TocEntry {
                            title,
                            href: resolve_href(nav_path, path),
                            fragment: fragment.map(str::to_string),
                            level,
                            chapter_index: None,
                        });
                    }
                }
                Some("ol") => walk_list(child, level + 1, nav_path, entries),
                _ => {}
            }
        }
    }
}

/// Match TOC entries to chapters by path-suffix containment, tolerating the
/// inconsistent relative-path conventions between package and TOC documents.
pub fn match_chapters(entries: &mut [TocEntry], chapters: &[Chapter]) {
    for entry in entries.iter_mut() {
        entry.chapter_index = chapters.iter().position(|ch| {
            ch.source_path == entry.href
                || ch.source_path.ends_with(&entry.href)
                || entry.href.ends_with(&ch.source_path)
        });
    }
}

/// Synthesize a flat TOC mirroring spine order, using derived chapter titles.
/// Used when no TOC document resolves or no entry matched any chapter.
pub fn synthesize(chapters: &[Chapter]) -> Vec<TocEntry> {
    chapters
        .iter()
        .enumerate()
        .map(|(i, ch)| TocEntry {
            title: ch.title.clone(),
            href: ch.source_path.clone(),
            fragment: None,
            level: 0,
            chapter_index: Some(i),
        })
        .collect()
}

fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}
