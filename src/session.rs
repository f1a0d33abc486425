//! The viewer session controller.
//!
//! A [`ReaderSession`] owns one loaded document, its per-chapter pagination
//! states, the global viewer preferences, and the in-memory highlight list.
//! Durable state flows through the collaborator stores at explicit points:
//! preferences on every change, the reading position on every navigation,
//! highlights on every mutation. Collaborator failures are logged and never
//! block reading.

use std::rc::Rc;

use log::{debug, warn};

use crate::document::{Document, LoadOptions, load_document};
use crate::error::{Error, Result};
use crate::events::EventSink;
use crate::highlight::{self, Color, Highlight};
use crate::layout::{
    self, CharMetrics, Direction, Measure, PaginationState, Transition, Viewport,
};
use crate::store::{AnnotationStore, PreferenceStore, ReadingPosition, ViewerPreferences};

pub struct ReaderSession {
    document_id: String,
    document: Document,
    prefs: ViewerPreferences,
    viewport: Viewport,
    measure: Box<dyn Measure>,

    states: Vec<PaginationState>,
    visited: Vec<bool>,
    /// Chapters whose last layout pass failed on geometry; retried on the
    /// next pass instead of erroring.
    dirty: Vec<bool>,
    current: usize,
    last_transition: Transition,

    highlights: Vec<Highlight>,

    preference_store: Rc<dyn PreferenceStore>,
    annotation_store: Rc<dyn AnnotationStore>,
    events: Box<dyn EventSink>,
}

impl ReaderSession {
    /// Load a document and open a session over it.
    ///
    /// Preferences are loaded once here; the reading position is restored
    /// when it still points inside the document. The initial chapter is
    /// paginated before the session is handed back, so the first render
    /// never shows a mis-sized flow.
    pub fn open(
        document_id: impl Into<String>,
        bytes: Vec<u8>,
        viewport: Viewport,
        preference_store: Rc<dyn PreferenceStore>,
        annotation_store: Rc<dyn AnnotationStore>,
        mut events: Box<dyn EventSink>,
        options: &LoadOptions,
    ) -> Result<Self> {
        let document_id = document_id.into();

        let prefs = match preference_store.load_preferences() {
            Ok(Some(prefs)) => prefs,
            Ok(None) => ViewerPreferences::default(),
            Err(e) => {
                warn!("preference store failed to load, using defaults: {e}");
                ViewerPreferences::default()
            }
        };

        let document = load_document(bytes, options, events.as_mut())?;
        let chapter_count = document.chapter_count();

        let highlights = match annotation_store.list(&document_id) {
            Ok(list) => list,
            Err(e) => {
                warn!("annotation store failed to list, starting empty: {e}");
                Vec::new()
            }
        };

        let mut session = Self {
            document_id,
            document,
            prefs,
            viewport,
            measure: Box::new(CharMetrics),
            states: vec![PaginationState::default(); chapter_count],
            visited: vec![false; chapter_count],
            dirty: vec![false; chapter_count],
            current: 0,
            last_transition: Transition::Jump,
            highlights,
            preference_store,
            annotation_store,
            events,
        };

        // Restore the last position when it still fits this document.
        let restored = match session.preference_store.load_position(&session.document_id) {
            Ok(pos) => pos,
            Err(e) => {
                warn!("preference store failed to load position: {e}");
                None
            }
        };
        if let Some(pos) = restored
            && pos.chapter < chapter_count
        {
            session.current = pos.chapter;
            session.ensure_paginated(pos.chapter);
            let count = session.states[pos.chapter].page_count;
            session.states[pos.chapter].page = pos.page.min(count.saturating_sub(1));
        } else {
            session.ensure_paginated(0);
        }

        session.emit_page_change();
        Ok(session)
    }

    /// Swap in a different measurement strategy (e.g. a real text shaper).
    /// Invalidates every pagination state.
    pub fn set_measure(&mut self, measure: Box<dyn Measure>) {
        self.measure = measure;
        self.invalidate_all();
        self.ensure_paginated(self.current);
        self.emit_page_change();
    }

    // ─── accessors ───

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn preferences(&self) -> &ViewerPreferences {
        &self.prefs
    }

    pub fn current_chapter(&self) -> &crate::chapter::Chapter {
        &self.document.chapters[self.current]
    }

    pub fn position(&self) -> ReadingPosition {
        ReadingPosition {
            chapter: self.current,
            page: self.states[self.current].page,
        }
    }

    /// The transition hint for the most recent navigation.
    pub fn last_transition(&self) -> Transition {
        self.last_transition
    }

    pub fn highlights(&self) -> &[Highlight] {
        &self.highlights
    }

    /// Highlights ordered the way the panel lists them.
    pub fn highlights_by_page(&self) -> Vec<&Highlight> {
        let mut list: Vec<&Highlight> = self.highlights.iter().collect();
        list.sort_by_key(|h| h.page_number);
        list
    }

    /// 1-indexed virtual page across all chapters. Approximate until every
    /// chapter has been paginated once (unvisited chapters count as one
    /// page).
    pub fn virtual_page(&self) -> usize {
        let before: usize = self.states[..self.current]
            .iter()
            .map(|s| s.page_count)
            .sum();
        before + self.states[self.current].page + 1
    }

    /// Sum of all chapters' (possibly still-default) page counts.
    pub fn virtual_total(&self) -> usize {
        self.states.iter().map(|s| s.page_count).sum::<usize>().max(1)
    }

    /// Horizontal offset of the current page within its chapter's flow.
    pub fn current_page_offset_px(&self) -> f32 {
        let state = &self.states[self.current];
        layout::page_offset_px(state, state.page)
    }

    /// Markup of the active chapter with its highlights applied.
    pub fn render_current_chapter(&self) -> String {
        let chapter = self.current_chapter();
        let chapter_highlights: Vec<Highlight> = self
            .highlights
            .iter()
            .filter(|h| h.chapter_id == chapter.id)
            .cloned()
            .collect();
        highlight::apply_highlights(&chapter.content, &chapter_highlights)
    }

    // ─── navigation ───

    /// Advance one page. Past the chapter's last page moves to the next
    /// chapter's first page; at the document's last page this is a no-op.
    pub fn next_page(&mut self) {
        let state = &self.states[self.current];
        if state.page + 1 < state.page_count {
            self.states[self.current].page += 1;
        } else if self.current + 1 < self.states.len() {
            self.current += 1;
            self.ensure_paginated(self.current);
            self.states[self.current].page = 0;
        } else {
            return;
        }
        self.last_transition = Transition::Slide(Direction::Forward);
        self.emit_page_change();
    }

    /// Go back one page. Before the chapter's first page moves to the prior
    /// chapter's last known page; at the document's first page this is a
    /// no-op.
    pub fn prev_page(&mut self) {
        if self.states[self.current].page > 0 {
            self.states[self.current].page -= 1;
        } else if self.current > 0 {
            self.current -= 1;
            self.ensure_paginated(self.current);
            let count = self.states[self.current].page_count;
            self.states[self.current].page = count.saturating_sub(1);
        } else {
            return;
        }
        self.last_transition = Transition::Slide(Direction::Backward);
        self.emit_page_change();
    }

    /// Jump to a chapter's first page (TOC selection). Out-of-range indexes
    /// clamp.
    pub fn go_to_chapter(&mut self, index: usize) {
        self.current = index.min(self.states.len() - 1);
        self.ensure_paginated(self.current);
        self.states[self.current].page = 0;
        self.last_transition = Transition::Jump;
        self.emit_page_change();
    }

    /// Jump to a 1-indexed virtual page. Resolves against the current
    /// (possibly approximate) page counts; values past the end land on the
    /// document's last known page.
    pub fn go_to_virtual_page(&mut self, virtual_page: usize) {
        let target = virtual_page.max(1);
        let mut accumulated = 0usize;
        let mut landed = None;
        for (i, state) in self.states.iter().enumerate() {
            if accumulated + state.page_count >= target {
                landed = Some((i, target - accumulated - 1));
                break;
            }
            accumulated += state.page_count;
        }
        let (chapter, page) = landed.unwrap_or_else(|| {
            let last = self.states.len() - 1;
            (last, self.states[last].page_count.saturating_sub(1))
        });

        self.current = chapter;
        self.ensure_paginated(chapter);
        let count = self.states[chapter].page_count;
        self.states[chapter].page = page.min(count.saturating_sub(1));
        self.last_transition = Transition::Jump;
        self.emit_page_change();
    }

    /// Jump to a highlight. The landing page is re-resolved from the
    /// anchor's character offset under current geometry, so it contains the
    /// highlighted text even after typography changes.
    pub fn jump_to_highlight(&mut self, id: &str) -> bool {
        let Some(hl) = self.highlights.iter().find(|h| h.id == id).cloned() else {
            return false;
        };
        let Some(chapter_idx) = self
            .document
            .chapters
            .iter()
            .position(|ch| ch.id == hl.chapter_id)
        else {
            return false;
        };

        self.current = chapter_idx;
        self.ensure_paginated(chapter_idx);
        let chapter = &self.document.chapters[chapter_idx];
        let page = layout::page_for_offset(
            chapter.blocks(),
            &self.prefs,
            self.viewport,
            self.measure.as_ref(),
            hl.start_offset,
        )
        .unwrap_or(0);
        let count = self.states[chapter_idx].page_count;
        self.states[chapter_idx].page = page.min(count.saturating_sub(1));
        self.last_transition = Transition::Jump;
        self.emit_page_change();
        true
    }

    // ─── viewport & preferences ───

    /// Resize the viewer. Every chapter's pagination is invalidated; the
    /// active chapter repaginates immediately.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.invalidate_all();
        self.ensure_paginated(self.current);
        self.emit_page_change();
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_font(&mut self, font: crate::store::FontFamily) {
        self.update_prefs(|p| p.font = font, true);
    }

    pub fn set_font_size(&mut self, size: f32) {
        self.update_prefs(|p| p.font_size = size, true);
    }

    pub fn set_line_height(&mut self, line_height: f32) {
        self.update_prefs(|p| p.line_height = line_height, true);
    }

    pub fn set_margin_size(&mut self, margin: u8) {
        self.update_prefs(|p| p.margin_size = margin, true);
    }

    pub fn set_letter_spacing(&mut self, spacing: f32) {
        self.update_prefs(|p| p.letter_spacing = spacing, true);
    }

    pub fn set_align(&mut self, align: crate::store::TextAlign) {
        self.update_prefs(|p| p.align = align, true);
    }

    /// Theme changes restyle but never reflow.
    pub fn set_theme(&mut self, theme: crate::store::Theme) {
        self.update_prefs(|p| p.theme = theme, false);
    }

    pub fn set_focus_mode(&mut self, on: bool) {
        self.update_prefs(|p| p.focus_mode = on, false);
    }

    fn update_prefs(&mut self, apply: impl FnOnce(&mut ViewerPreferences), reflow: bool) {
        apply(&mut self.prefs);
        if let Err(e) = self.preference_store.save_preferences(&self.prefs) {
            warn!("preference store failed to save: {e}");
        }
        if reflow {
            self.invalidate_all();
            self.ensure_paginated(self.current);
            self.emit_page_change();
        }
    }

    // ─── highlights ───

    /// Anchor a selection in the current chapter and persist it. Returns the
    /// new highlight's id, or `None` when the selection is too short or out
    /// of range.
    pub fn create_highlight(&mut self, start_offset: usize, len: usize, color: Color) -> Option<String> {
        let virtual_page = self.virtual_page();
        let chapter = self.current_chapter();
        let hl = highlight::anchor_selection(chapter, start_offset, len, color, virtual_page)?;

        if let Err(e) = self.annotation_store.insert(&self.document_id, &hl) {
            warn!("annotation store failed to insert, keeping in memory: {e}");
        }
        let id = hl.id.clone();
        self.highlights.push(hl);
        Some(id)
    }

    /// Attach, replace, or clear a highlight's memo.
    pub fn update_memo(&mut self, id: &str, memo: Option<String>) -> bool {
        let Some(hl) = self.highlights.iter_mut().find(|h| h.id == id) else {
            return false;
        };
        hl.memo = memo.clone();
        if let Err(e) = self.annotation_store.update_memo(&self.document_id, id, memo) {
            warn!("annotation store failed to update memo: {e}");
        }
        true
    }

    /// Remove a highlight; its marker disappears on the next render pass.
    pub fn delete_highlight(&mut self, id: &str) -> bool {
        let before = self.highlights.len();
        self.highlights.retain(|h| h.id != id);
        if self.highlights.len() == before {
            return false;
        }
        if let Err(e) = self.annotation_store.delete(&self.document_id, id) {
            warn!("annotation store failed to delete: {e}");
        }
        true
    }

    // ─── internals ───

    fn invalidate_all(&mut self) {
        for v in &mut self.visited {
            *v = false;
        }
    }

    /// Paginate a chapter if it has no valid state. Geometry failures are
    /// deferred: the chapter keeps its default single-page state, is marked
    /// dirty, and the next pass retries.
    fn ensure_paginated(&mut self, index: usize) {
        if self.visited[index] && !self.dirty[index] {
            return;
        }
        let chapter = &self.document.chapters[index];
        match layout::paginate(
            chapter.blocks(),
            &self.prefs,
            self.viewport,
            self.measure.as_ref(),
        ) {
            Ok(state) => {
                let old_page = self.states[index].page;
                self.states[index] = state;
                self.states[index].page = old_page.min(state.page_count.saturating_sub(1));
                self.visited[index] = true;
                self.dirty[index] = false;
            }
            Err(Error::Render(msg)) => {
                debug!("layout deferred for chapter {index}: {msg}");
                self.dirty[index] = true;
            }
            Err(e) => {
                warn!("layout failed for chapter {index}: {e}");
                self.dirty[index] = true;
            }
        }
    }

    fn emit_page_change(&mut self) {
        let page = self.virtual_page();
        let total = self.virtual_total();
        self.events.on_page_change(page, total);
        let pos = self.position();
        if let Err(e) = self.preference_store.save_position(&self.document_id, pos) {
            warn!("preference store failed to save position: {e}");
        }
    }
}

impl Drop for ReaderSession {
    fn drop(&mut self) {
        // Image handles are exclusively owned by the session; revoke them so
        // a torn-down viewer cannot leak decoded resources.
        self.document.images.clear();
        debug!("session closed: {}", self.document_id);
    }
}
