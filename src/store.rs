//! Collaborator interfaces for durable state.
//!
//! The engine owns no persistence. Viewer preferences (global), reading
//! positions (per document), and highlight records are pushed through these
//! traits with last-write-wins semantics; the backing implementation is the
//! embedder's concern. [`MemoryStore`] implements both traits for tests and
//! simple embeddings.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::highlight::Highlight;

/// A collaborator store failed. Store failures are never fatal to reading:
/// the session logs them and keeps its in-memory state.
#[derive(Error, Debug)]
#[error("store error: {0}")]
pub struct StoreError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontFamily {
    Sans,
    Serif,
    Mono,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Sepia,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Justify,
}

/// Reader typography and theme settings. Global and durable across sessions;
/// owned by the session controller, loaded once at initialization, and
/// persisted through [`PreferenceStore`] on every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerPreferences {
    pub font: FontFamily,
    /// Base font size in device pixels.
    pub font_size: f32,
    /// Unitless line-height multiplier.
    pub line_height: f32,
    pub theme: Theme,
    /// Margin preset, 1 (narrow) through 4 (very wide).
    pub margin_size: u8,
    /// Letter-spacing step; rendered as `step * 0.5` px.
    pub letter_spacing: f32,
    pub align: TextAlign,
    pub focus_mode: bool,
}

impl Default for ViewerPreferences {
    fn default() -> Self {
        Self {
            font: FontFamily::Sans,
            font_size: 18.0,
            line_height: 1.8,
            theme: Theme::Dark,
            margin_size: 2,
            letter_spacing: 0.0,
            align: TextAlign::Left,
            focus_mode: false,
        }
    }
}

/// Last reading position within a document: chapter index and 0-based
/// page-in-chapter. Keyed per document identity, last write wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingPosition {
    pub chapter: usize,
    pub page: usize,
}

/// Durable store for global preferences and per-document positions.
pub trait PreferenceStore {
    fn load_preferences(&self) -> Result<Option<ViewerPreferences>, StoreError>;
    fn save_preferences(&self, prefs: &ViewerPreferences) -> Result<(), StoreError>;
    fn load_position(&self, document: &str) -> Result<Option<ReadingPosition>, StoreError>;
    fn save_position(&self, document: &str, pos: ReadingPosition) -> Result<(), StoreError>;
}

/// Durable store for highlight/annotation records, keyed by document.
pub trait AnnotationStore {
    fn list(&self, document: &str) -> Result<Vec<Highlight>, StoreError>;
    fn insert(&self, document: &str, highlight: &Highlight) -> Result<(), StoreError>;
    fn update_memo(&self, document: &str, id: &str, memo: Option<String>) -> Result<(), StoreError>;
    fn delete(&self, document: &str, id: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
struct MemoryInner {
    preferences: Option<ViewerPreferences>,
    positions: HashMap<String, ReadingPosition>,
    annotations: HashMap<String, Vec<Highlight>>,
}

/// In-memory implementation of both stores.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn load_preferences(&self) -> Result<Option<ViewerPreferences>, StoreError> {
        Ok(self.inner.lock().unwrap().preferences.clone())
    }

    fn save_preferences(&self, prefs: &ViewerPreferences) -> Result<(), StoreError> {
        self.inner.lock().unwrap().preferences = Some(prefs.clone());
        Ok(())
    }

    fn load_position(&self, document: &str) -> Result<Option<ReadingPosition>, StoreError> {
        Ok(self.inner.lock().unwrap().positions.get(document).copied())
    }

    fn save_position(&self, document: &str, pos: ReadingPosition) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .positions
            .insert(document.to_string(), pos);
        Ok(())
    }
}

impl AnnotationStore for MemoryStore {
    fn list(&self, document: &str) -> Result<Vec<Highlight>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .annotations
            .get(document)
            .cloned()
            .unwrap_or_default())
    }

    fn insert(&self, document: &str, highlight: &Highlight) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .annotations
            .entry(document.to_string())
            .or_default()
            .push(highlight.clone());
        Ok(())
    }

    fn update_memo(&self, document: &str, id: &str, memo: Option<String>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let records = inner
            .annotations
            .get_mut(document)
            .ok_or_else(|| StoreError(format!("unknown document: {document}")))?;
        let record = records
            .iter_mut()
            .find(|h| h.id == id)
            .ok_or_else(|| StoreError(format!("unknown highlight: {id}")))?;
        record.memo = memo;
        Ok(())
    }

    fn delete(&self, document: &str, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(records) = inner.annotations.get_mut(document) {
            records.retain(|h| h.id != id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferences_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.load_preferences().unwrap().is_none());

        let mut prefs = ViewerPreferences::default();
        prefs.font_size = 22.0;
        store.save_preferences(&prefs).unwrap();
        assert_eq!(store.load_preferences().unwrap(), Some(prefs));
    }

    #[test]
    fn test_wire_shapes_are_stable() {
        // Collaborator stores serialize these records; the field names and
        // enum spellings are part of the contract.
        let prefs = ViewerPreferences::default();
        let json = serde_json::to_value(&prefs).unwrap();
        assert_eq!(json["font"], "sans");
        assert_eq!(json["theme"], "dark");
        assert_eq!(json["font_size"], 18.0);

        let pos: ReadingPosition = serde_json::from_str(r#"{"chapter":2,"page":7}"#).unwrap();
        assert_eq!(pos, ReadingPosition { chapter: 2, page: 7 });
    }

    #[test]
    fn test_position_last_write_wins() {
        let store = MemoryStore::new();
        store
            .save_position("doc-1", ReadingPosition { chapter: 0, page: 2 })
            .unwrap();
        store
            .save_position("doc-1", ReadingPosition { chapter: 3, page: 0 })
            .unwrap();
        assert_eq!(
            store.load_position("doc-1").unwrap(),
            Some(ReadingPosition { chapter: 3, page: 0 })
        );
        assert!(store.load_position("doc-2").unwrap().is_none());
    }
}
