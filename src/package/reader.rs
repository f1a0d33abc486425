use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::util::{decode_text, extract_xml_encoding, strip_bom};

use super::path::resolve_href;
use super::{ManifestItem, Metadata, PackageDoc, SpineEntry, TocKind, TocSource};

/// An opened document archive.
///
/// The byte source is an opaque fully-buffered blob; there is no streaming
/// read path. Lookups fall back to percent-decoded names to cope with
/// packages that percent-encode manifest hrefs.
pub struct Archive {
    zip: ZipArchive<Cursor<Vec<u8>>>,
}

impl Archive {
    /// Open an archive from a fully-buffered blob.
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        let zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| Error::Archive(format!("unreadable container: {e}")))?;
        Ok(Self { zip })
    }

    /// Read a file's raw bytes by archive path.
    pub fn read_bytes(&mut self, path: &str) -> Result<Vec<u8>> {
        match self.zip.by_name(path) {
            Ok(mut file) => {
                let mut contents = Vec::new();
                file.read_to_end(&mut contents)?;
                return Ok(contents);
            }
            Err(zip::result::ZipError::FileNotFound) => {}
            Err(e) => return Err(e.into()),
        }

        // Fallback: percent-decoded path (handles packages that encode hrefs)
        let decoded = percent_encoding::percent_decode_str(path)
            .decode_utf8()
            .map_err(|_| Error::Archive(format!("invalid UTF-8 in path: {path}")))?;

        let mut file = self.zip.by_name(&decoded)?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        Ok(contents)
    }

    /// Read a file and decode it to text, honoring an XML encoding
    /// declaration when the bytes are not valid UTF-8.
    pub fn read_text(&mut self, path: &str) -> Result<String> {
        let bytes = self.read_bytes(path)?;
        let bytes = strip_bom(&bytes);
        let hint = extract_xml_encoding(bytes);
        Ok(decode_text(bytes, hint).into_owned())
    }

    /// Whether the archive contains a file at `path` (exact name only).
    pub fn contains(&mut self, path: &str) -> bool {
        self.zip.by_name(path).is_ok()
    }
}

/// Parse the package out of an opened archive: container descriptor, package
/// document, manifest, spine, and TOC pointer.
///
/// Fails with [`Error::Archive`] when the container descriptor or package
/// document is missing, and with [`Error::Structure`] when the spine resolves
/// to zero manifest entries. There is no partial success.
pub fn read_package(archive: &mut Archive) -> Result<PackageDoc> {
    let container = archive
        .read_text("META-INF/container.xml")
        .map_err(|_| Error::Archive("missing META-INF/container.xml".into()))?;
    let opf_path = find_opf_path(&container)?;

    let opf_content = archive
        .read_text(&opf_path)
        .map_err(|_| Error::Archive(format!("missing package document: {opf_path}")))?;

    let package = parse_opf(&opf_content, &opf_path)?;

    if package.spine.is_empty() {
        return Err(Error::Structure(
            "spine references no resolvable manifest entries".into(),
        ));
    }

    Ok(package)
}

fn find_opf_path(container: &str) -> Result<String> {
    let mut reader = Reader::from_str(container);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"rootfile" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        return Ok(String::from_utf8(attr.value.to_vec())?);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Err(Error::Archive("no rootfile in container.xml".into()))
}

fn parse_opf(content: &str, opf_path: &str) -> Result<PackageDoc> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut title: Option<String> = None;
    let mut author: Option<String> = None;
    let mut language: Option<String> = None;

    let mut manifest: HashMap<String, ManifestItem> = HashMap::new();
    let mut spine_ids: Vec<String> = Vec::new();
    let mut ncx_id: Option<String> = None;

    let mut in_metadata = false;
    let mut current_element: Option<String> = None;
    let mut buf_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"metadata" => in_metadata = true,
                    elem @ (b"title" | b"creator" | b"language") => {
                        if in_metadata {
                            current_element = Some(String::from_utf8_lossy(elem).to_string());
                            buf_text.clear();
                        }
                    }
                    b"spine" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"toc" {
                                ncx_id = Some(String::from_utf8(attr.value.to_vec())?);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"item" => {
                        let mut id = String::new();
                        let mut href = String::new();
                        let mut media_type = String::new();
                        let mut properties: Option<String> = None;

                        for attr in e.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"id" => id = String::from_utf8(attr.value.to_vec())?,
                                b"href" => href = String::from_utf8(attr.value.to_vec())?,
                                b"media-type" => {
                                    media_type = String::from_utf8(attr.value.to_vec())?
                                }
                                b"properties" => {
                                    properties = Some(String::from_utf8(attr.value.to_vec())?)
                                }
                                _ => {}
                            }
                        }

                        if !id.is_empty() && !href.is_empty() {
                            let resolved = resolve_href(opf_path, &href);
                            manifest.insert(
                                id.clone(),
                                ManifestItem {
                                    id,
                                    href: resolved,
                                    media_type,
                                    properties,
                                },
                            );
                        }
                    }
                    b"itemref" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"idref" {
                                spine_ids.push(String::from_utf8(attr.value.to_vec())?);
                            }
                        }
                    }
                    b"spine" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"toc" {
                                ncx_id = Some(String::from_utf8(attr.value.to_vec())?);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if current_element.is_some() {
                    buf_text.push_str(resolve_entity(&String::from_utf8_lossy(e.as_ref())));
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                if local_name(name.as_ref()) == b"metadata" {
                    in_metadata = false;
                }

                if let Some(ref elem) = current_element {
                    let text = buf_text.trim().to_string();
                    if !text.is_empty() {
                        match elem.as_str() {
                            "title" => title.get_or_insert(text),
                            "creator" => author.get_or_insert(text),
                            "language" => language.get_or_insert(text),
                            _ => unreachable!(),
                        };
                    }
                    current_element = None;
                    buf_text.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    // Reading order: only idrefs that resolve in the manifest survive.
    let spine: Vec<SpineEntry> = spine_ids
        .into_iter()
        .filter(|id| manifest.contains_key(id))
        .map(|idref| SpineEntry { idref })
        .collect();

    // TOC discovery: an EPUB 3 navigation document wins over a legacy NCX
    // when both are declared.
    let nav = manifest.values().find(|item| item.is_nav());
    let toc = if let Some(nav) = nav {
        Some(TocSource {
            href: nav.href.clone(),
            kind: TocKind::Nav,
        })
    } else {
        ncx_id
            .and_then(|id| manifest.get(&id))
            .or_else(|| {
                manifest
                    .values()
                    .find(|item| item.media_type == "application/x-dtbncx+xml")
            })
            .map(|item| TocSource {
                href: item.href.clone(),
                kind: TocKind::Ncx,
            })
    };

    let defaults = Metadata::default();
    Ok(PackageDoc {
        metadata: Metadata {
            title: title.unwrap_or(defaults.title),
            author: author.unwrap_or(defaults.author),
            language: language.unwrap_or(defaults.language),
        },
        manifest,
        spine,
        toc,
    })
}

fn resolve_entity(entity: &str) -> &'static str {
    match entity {
        "apos" => "'",
        "quot" => "\"",
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        _ => "",
    }
}

/// Extract the local name from a potentially namespaced XML name.
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}
