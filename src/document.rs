//! Document assembly: the full load pipeline from archive bytes to an
//! ordered chapter stream with a resolved table of contents.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;

use crate::chapter::{self, Chapter};
use crate::error::{Error, Result};
use crate::events::EventSink;
use crate::image::ImageStore;
use crate::package::{self, Archive, Metadata, TocKind};
use crate::toc::{self, TocEntry};

/// Cooperative cancellation flag for an in-flight load.
///
/// Checked at every suspension point (per image, per chapter). A cancelled
/// load abandons its work, drops every image handle it already decoded, and
/// returns [`Error::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Options for a document load.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub cancel: CancelToken,
}

/// A fully loaded document: metadata, spine-ordered chapters, resolved TOC,
/// and the shared image handles chapters reference.
#[derive(Debug)]
pub struct Document {
    pub metadata: Metadata,
    pub chapters: Vec<Chapter>,
    pub toc: Vec<TocEntry>,
    pub images: ImageStore,
}

impl Document {
    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }
}

/// Load a document from a fully-buffered archive blob.
///
/// Either at least one chapter loads, or the whole operation fails — there
/// is no partial success. A single malformed content document is skipped
/// (with a warning) as long as another chapter survives.
pub fn load_document(
    bytes: Vec<u8>,
    options: &LoadOptions,
    events: &mut dyn EventSink,
) -> Result<Document> {
    let cancel = &options.cancel;
    events.on_load_progress(5);

    let mut archive = Archive::new(bytes)?;
    events.on_load_progress(15);

    let package = package::read_package(&mut archive)?;
    events.on_load_progress(25);

    // Image resources are decoded once up front and shared across chapters.
    let mut images = ImageStore::new();
    let image_items: Vec<_> = package
        .manifest
        .values()
        .filter(|item| item.is_image())
        .cloned()
        .collect();
    for (i, item) in image_items.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match archive.read_bytes(&item.href) {
            Ok(data) => images.insert(item.href.clone(), data, item.media_type.clone()),
            Err(_) => warn!("image resource missing from archive: {}", item.href),
        }
        let pct = 30 + ((i as f32 / image_items.len().max(1) as f32) * 20.0).round() as u8;
        events.on_load_progress(pct);
    }

    // Chapters, in spine order. Progress is only meaningful because the
    // loop is sequential.
    events.on_load_progress(60);
    let mut chapters: Vec<Chapter> = Vec::new();
    let spine_len = package.spine.len();
    for (i, entry) in package.spine.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(item) = package.spine_item(entry) else {
            continue;
        };
        match archive.read_text(&item.href) {
            Ok(html) => {
                if let Some(chapter) =
                    chapter::extract(&item.id, &item.href, &html, &images, chapters.len())
                {
                    chapters.push(chapter);
                }
            }
            Err(e) => warn!("skipping unreadable chapter {}: {e}", item.href),
        }
        let pct = 60 + ((i as f32 / spine_len as f32) * 30.0).round() as u8;
        events.on_load_progress(pct);
    }

    if chapters.is_empty() {
        return Err(Error::Structure("no readable chapters in document".into()));
    }

    // TOC: parse whichever document the package points at, match entries to
    // chapters, and fall back to a synthetic spine-order list when nothing
    // resolves.
    events.on_load_progress(92);
    let mut entries = match &package.toc {
        Some(source) => match archive.read_text(&source.href) {
            Ok(content) => match source.kind {
                TocKind::Ncx => toc::parse_ncx(&content, &source.href).unwrap_or_else(|e| {
                    warn!("unparseable NCX document: {e}");
                    Vec::new()
                }),
                TocKind::Nav => toc::parse_nav(&content, &source.href),
            },
            Err(e) => {
                warn!("TOC document missing from archive: {e}");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    toc::match_chapters(&mut entries, &chapters);
    if entries.is_empty() || entries.iter().all(|e| e.chapter_index.is_none()) {
        entries = toc::synthesize(&chapters);
    }

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    events.on_load_progress(100);
    events.on_load_complete(chapters.len());

    Ok(Document {
        metadata: package.metadata,
        chapters,
        toc: entries,
        images,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;

    #[test]
    fn test_garbage_bytes_is_archive_error() {
        let err = load_document(vec![0u8; 64], &LoadOptions::default(), &mut NullSink).unwrap_err();
        assert!(matches!(err, Error::Archive(_)));
    }

    #[test]
    fn test_cancelled_before_start() {
        let options = LoadOptions::default();
        options.cancel.cancel();
        // Cancellation is only observed at suspension points, so a cancelled
        // token with an unreadable archive still reports the archive error.
        let err = load_document(vec![0u8; 8], &options, &mut NullSink).unwrap_err();
        assert!(matches!(err, Error::Archive(_)));
    }
}
