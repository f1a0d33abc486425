mod reader;

pub mod path;

pub use reader::{Archive, read_package};

use std::collections::HashMap;

/// Package-level metadata (Dublin Core subset).
///
/// Fields fall back to reader-friendly defaults when the package document
/// omits them.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub title: String,
    pub author: String,
    pub language: String,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            title: "Untitled".to_string(),
            author: "Unknown".to_string(),
            language: "ko".to_string(),
        }
    }
}

/// An entry in the package manifest. `href` is already resolved against the
/// package document's directory, so it addresses the archive root directly.
#[derive(Debug, Clone)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

impl ManifestItem {
    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }

    pub fn is_nav(&self) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|p| p.split_ascii_whitespace().any(|w| w == "nav"))
    }
}

/// One ordered reference in the spine. Created once at parse time and
/// immutable thereafter.
#[derive(Debug, Clone)]
pub struct SpineEntry {
    pub idref: String,
}

/// Which table-of-contents format a package points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TocKind {
    /// Legacy EPUB 2 NCX document.
    Ncx,
    /// EPUB 3 navigation document.
    Nav,
}

/// Pointer to the package's table-of-contents document.
#[derive(Debug, Clone)]
pub struct TocSource {
    /// Archive-root path of the TOC document.
    pub href: String,
    pub kind: TocKind,
}

/// Fully parsed package document: metadata, manifest, reading order, and the
/// TOC pointer if one was declared.
#[derive(Debug, Clone)]
pub struct PackageDoc {
    pub metadata: Metadata,
    /// Manifest id -> item. Ids are unique within a package.
    pub manifest: HashMap<String, ManifestItem>,
    /// Linear reading order. Only entries whose idref resolves in the
    /// manifest survive parsing.
    pub spine: Vec<SpineEntry>,
    pub toc: Option<TocSource>,
}

impl PackageDoc {
    /// Manifest item for a spine entry, if it still resolves.
    pub fn spine_item(&self, entry: &SpineEntry) -> Option<&ManifestItem> {
        self.manifest.get(&entry.idref)
    }
}
