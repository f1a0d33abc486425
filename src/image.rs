//! In-memory image handles.
//!
//! Image resources referenced by content documents are decompressed once at
//! load time and held as shared binary handles, reused across every chapter
//! that references them. Handles are owned by the active viewer session and
//! released when it ends or the archive is replaced.

use std::collections::HashMap;
use std::sync::Arc;

/// A decoded image resource.
#[derive(Debug, Clone)]
pub struct ImageHandle {
    pub data: Arc<[u8]>,
    pub media_type: String,
}

/// Archive-path-keyed store of image handles.
#[derive(Debug, Default)]
pub struct ImageStore {
    handles: HashMap<String, ImageHandle>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, data: Vec<u8>, media_type: impl Into<String>) {
        self.handles.insert(
            path.into(),
            ImageHandle {
                data: Arc::from(data.into_boxed_slice()),
                media_type: media_type.into(),
            },
        );
    }

    pub fn get(&self, path: &str) -> Option<&ImageHandle> {
        self.handles.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.handles.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Drop every handle. Called on session teardown and archive replacement.
    pub fn clear(&mut self) {
        self.handles.clear();
    }
}
