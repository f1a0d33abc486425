//! Reflow pagination.
//!
//! A chapter is laid out as one continuous multi-column flow where each
//! column is exactly the content area, separated by a fixed gap. The page
//! count is the measured flow width divided by the column stride; page `i`
//! sits at horizontal offset `i * stride`. Everything here is recomputed on
//! chapter switch, viewport resize, or any typography change — page counts
//! are throwaway state, never persisted.

pub mod measure;

pub use measure::{CharMetrics, Measure};

use crate::chapter::ContentBlock;
use crate::error::{Error, Result};
use crate::store::ViewerPreferences;

/// Fixed gap between columns, in device pixels.
pub const COLUMN_GAP: f32 = 40.0;

/// Vertical chrome reserved above/below the content area, in device pixels.
const VERTICAL_PADDING: f32 = 96.0;

/// Margin presets: horizontal padding and content max-width per level.
/// Out-of-range levels clamp to the "normal" preset.
const MARGIN_PRESETS: [(f32, f32); 4] = [
    (12.0, 896.0),
    (40.0, 672.0),
    (56.0, 576.0),
    (64.0, 448.0),
];

/// The viewer's visible area in device pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

/// Resolved content geometry: the column box that text actually flows in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub column_width: f32,
    pub column_height: f32,
}

/// Per-chapter pagination state. Mutable, recomputed, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaginationState {
    /// Column width the count was computed at, in device pixels.
    pub column_width: f32,
    /// Total pages in the chapter (≥ 1).
    pub page_count: usize,
    /// Current page-in-chapter, 0-based.
    pub page: usize,
}

impl Default for PaginationState {
    /// Unvisited chapters count as a single page until actually paginated,
    /// which makes virtual totals an approximation until every chapter has
    /// been visited once.
    fn default() -> Self {
        Self {
            column_width: 0.0,
            page_count: 1,
            page: 0,
        }
    }
}

/// Navigation direction for directional transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Semantic transition hint passed to the renderer: sequential navigation
/// slides, arbitrary jumps cut. Presentation may ignore it entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Slide(Direction),
    Jump,
}

/// Resolve the content geometry for a viewport at the given margin preset.
///
/// Fails with [`Error::Render`] when the viewport leaves no room for
/// content; callers defer and retry on the next layout pass.
pub fn resolve_geometry(viewport: Viewport, margin_size: u8) -> Result<Geometry> {
    let idx = (margin_size.clamp(1, 4) - 1) as usize;
    let (margin_px, max_width) = MARGIN_PRESETS[idx];

    let column_width = (viewport.width - 2.0 * margin_px).min(max_width);
    let column_height = viewport.height - VERTICAL_PADDING;

    if column_width <= 0.0 || column_height <= 0.0 {
        return Err(Error::Render(format!(
            "content area is empty at {}x{}",
            viewport.width, viewport.height
        )));
    }

    Ok(Geometry {
        column_width,
        column_height,
    })
}

/// Paginate one chapter's blocks at the current typography and viewport.
pub fn paginate(
    blocks: &[ContentBlock],
    prefs: &ViewerPreferences,
    viewport: Viewport,
    measure: &dyn Measure,
) -> Result<PaginationState> {
    let geom = resolve_geometry(viewport, prefs.margin_size)?;
    let flow_width = measure.flow_width(blocks, prefs, &geom);
    let stride = geom.column_width + COLUMN_GAP;
    let page_count = ((flow_width / stride).round() as usize).max(1);

    Ok(PaginationState {
        column_width: geom.column_width,
        page_count,
        page: 0,
    })
}

/// Horizontal offset of a page within the chapter's flow, in device pixels.
pub fn page_offset_px(state: &PaginationState, page: usize) -> f32 {
    page as f32 * (state.column_width + COLUMN_GAP)
}

/// Which page of a chapter contains the given flat-text character offset,
/// under current geometry. Drives highlight navigation.
pub fn page_for_offset(
    blocks: &[ContentBlock],
    prefs: &ViewerPreferences,
    viewport: Viewport,
    measure: &dyn Measure,
    offset: usize,
) -> Result<usize> {
    let geom = resolve_geometry(viewport, prefs.margin_size)?;
    Ok(measure.page_for_offset(blocks, prefs, &geom, offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapter::{BlockKind, ContentBlock};

    fn viewport() -> Viewport {
        Viewport {
            width: 800.0,
            height: 900.0,
        }
    }

    #[test]
    fn test_zero_viewport_is_render_error() {
        let err = resolve_geometry(Viewport { width: 0.0, height: 600.0 }, 2).unwrap_err();
        assert!(matches!(err, Error::Render(_)));
    }

    #[test]
    fn test_margin_presets_clamp() {
        let g1 = resolve_geometry(viewport(), 0).unwrap();
        let g2 = resolve_geometry(viewport(), 1).unwrap();
        assert_eq!(g1, g2);
        let g9 = resolve_geometry(viewport(), 9).unwrap();
        let g4 = resolve_geometry(viewport(), 4).unwrap();
        assert_eq!(g9, g4);
    }

    #[test]
    fn test_wider_margin_narrower_column() {
        let narrow = resolve_geometry(viewport(), 4).unwrap();
        let wide = resolve_geometry(viewport(), 1).unwrap();
        assert!(narrow.column_width < wide.column_width);
    }

    #[test]
    fn test_paginate_counts_pages() {
        let prefs = ViewerPreferences::default();
        let blocks = vec![ContentBlock::text_block(
            BlockKind::Paragraph,
            "문장을 반복한다. ".repeat(400),
        )];
        let state = paginate(&blocks, &prefs, viewport(), &CharMetrics).unwrap();
        assert!(state.page_count > 1);
        assert_eq!(state.page, 0);

        let offset = page_offset_px(&state, 2);
        assert_eq!(offset, 2.0 * (state.column_width + COLUMN_GAP));
    }

    #[test]
    fn test_empty_chapter_one_page() {
        let prefs = ViewerPreferences::default();
        let state = paginate(&[], &prefs, viewport(), &CharMetrics).unwrap();
        assert_eq!(state.page_count, 1);
    }
}
