//! Callbacks surfaced to the embedding shell.

/// Viewer lifecycle callbacks.
///
/// All methods default to no-ops so embedders implement only what they
/// observe. `on_page_change` fires on every navigation, including the
/// implicit one after a repagination.
pub trait EventSink {
    /// Load progress, 0–100.
    fn on_load_progress(&mut self, _percent: u8) {}

    /// The document finished loading with this many chapters.
    fn on_load_complete(&mut self, _chapter_count: usize) {}

    /// Current virtual page and virtual total. Both are approximations
    /// until every chapter has been paginated at least once.
    fn on_page_change(&mut self, _virtual_page: usize, _virtual_total: usize) {}
}

/// Sink that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {}
