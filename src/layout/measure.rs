//! Text measurement strategy.
//!
//! Page counts come from measuring the rendered flow, which couples
//! pagination to a text-shaping capability. The engine keeps that capability
//! behind [`Measure`] so embedders with a real shaper can plug one in;
//! [`CharMetrics`] is the built-in deterministic estimator based on
//! per-character advance classes.

use crate::chapter::{BlockKind, ContentBlock};
use crate::store::ViewerPreferences;

use super::Geometry;

/// Measurement strategy for reflowed chapter content.
pub trait Measure {
    /// Total width of the chapter laid out as one continuous multi-column
    /// flow at the given geometry (the multi-column `scrollWidth`
    /// equivalent, including the trailing column's gap).
    fn flow_width(&self, blocks: &[ContentBlock], prefs: &ViewerPreferences, geom: &Geometry)
    -> f32;

    /// The 0-based page (column) containing the given character offset into
    /// the chapter's flattened text.
    fn page_for_offset(
        &self,
        blocks: &[ContentBlock],
        prefs: &ViewerPreferences,
        geom: &Geometry,
        offset: usize,
    ) -> usize;
}

/// Deterministic character-class estimator.
///
/// Fullwidth characters (Hangul, CJK, fullwidth forms) advance one em,
/// everything else a narrow fraction; block heights follow the viewer's
/// rendering rules (heading scale factors, paragraph spacing, capped image
/// extents). Not shaping-accurate, but stable across runs, monotonic in
/// content length, and sufficient for column counting.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharMetrics;

const NARROW_EM: f32 = 0.55;
const HEADING_LINE_HEIGHT: f32 = 1.35;
const IMAGE_MAX_PX: f32 = 480.0;

impl CharMetrics {
    fn font_px(prefs: &ViewerPreferences, kind: BlockKind) -> f32 {
        let scale = match kind {
            BlockKind::Heading1 => 1.6,
            BlockKind::Heading2 => 1.35,
            BlockKind::Heading3 => 1.15,
            _ => 1.0,
        };
        (prefs.font_size * scale).round()
    }

    fn line_px(prefs: &ViewerPreferences, kind: BlockKind) -> f32 {
        let lh = match kind {
            BlockKind::Heading1 | BlockKind::Heading2 | BlockKind::Heading3 => HEADING_LINE_HEIGHT,
            _ => prefs.line_height,
        };
        Self::font_px(prefs, kind) * lh
    }

    fn advance_px(c: char, font_px: f32, letter_spacing: f32) -> f32 {
        let em = if is_fullwidth(c) { 1.0 } else { NARROW_EM };
        em * font_px + letter_spacing * 0.5
    }

    fn text_width_px(text: &str, font_px: f32, letter_spacing: f32) -> f32 {
        text.chars()
            .map(|c| Self::advance_px(c, font_px, letter_spacing))
            .sum()
    }

    /// Height of one block at the given column width, including its margins.
    fn block_height(block: &ContentBlock, prefs: &ViewerPreferences, column_width: f32) -> f32 {
        let font_px = Self::font_px(prefs, block.kind);
        match block.kind {
            BlockKind::Rule => {
                // 2em margins either side of a hairline.
                2.0 * 2.0 * prefs.font_size + 1.0
            }
            BlockKind::Image => {
                // Images are capped to a fraction of the column, with 1em
                // margins above and below.
                IMAGE_MAX_PX.min(column_width * 0.75) + 2.0 * prefs.font_size
            }
            kind => {
                let text_width = Self::text_width_px(&block.text, font_px, prefs.letter_spacing);
                let lines = (text_width / column_width).ceil().max(1.0);
                let line_px = Self::line_px(prefs, kind);
                let margins = match kind {
                    BlockKind::Heading1 | BlockKind::Heading2 | BlockKind::Heading3 => {
                        // 1.5em above, 0.75em below.
                        2.25 * font_px
                    }
                    _ => 0.8 * font_px,
                };
                lines * line_px + margins
            }
        }
    }

    fn total_height(blocks: &[ContentBlock], prefs: &ViewerPreferences, geom: &Geometry) -> f32 {
        blocks
            .iter()
            .map(|b| Self::block_height(b, prefs, geom.column_width))
            .sum()
    }

    fn columns(blocks: &[ContentBlock], prefs: &ViewerPreferences, geom: &Geometry) -> f32 {
        (Self::total_height(blocks, prefs, geom) / geom.column_height)
            .ceil()
            .max(1.0)
    }
}

impl Measure for CharMetrics {
    fn flow_width(
        &self,
        blocks: &[ContentBlock],
        prefs: &ViewerPreferences,
        geom: &Geometry,
    ) -> f32 {
        Self::columns(blocks, prefs, geom) * (geom.column_width + super::COLUMN_GAP)
    }

    fn page_for_offset(
        &self,
        blocks: &[ContentBlock],
        prefs: &ViewerPreferences,
        geom: &Geometry,
        offset: usize,
    ) -> usize {
        let last_page = Self::columns(blocks, prefs, geom) as usize - 1;

        let mut y = 0.0f32;
        let mut consumed = 0usize;

        for block in blocks {
            let block_chars = block.text.chars().count();
            if offset < consumed + block_chars {
                let font_px = Self::font_px(prefs, block.kind);
                let prefix: f32 = block
                    .text
                    .chars()
                    .take(offset - consumed)
                    .map(|c| Self::advance_px(c, font_px, prefs.letter_spacing))
                    .sum();
                let line = (prefix / geom.column_width).floor();
                let y_at = y + line * Self::line_px(prefs, block.kind);
                let page = (y_at / geom.column_height).floor() as usize;
                return page.min(last_page);
            }
            consumed += block_chars;
            y += Self::block_height(block, prefs, geom.column_width);
        }

        last_page
    }
}

/// East Asian fullwidth ranges relevant to reading content: Hangul, CJK
/// ideographs, kana, fullwidth forms and punctuation.
fn is_fullwidth(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x115F
            | 0x2E80..=0x303E
            | 0x3041..=0x33FF
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xA000..=0xA4CF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFF60
            | 0xFFE0..=0xFFE6
            | 0x20000..=0x2FFFD
    )
}
