//! Property checks for the pure kernels: paragraph segmentation, path
//! resolution, and highlight marker round-trips.

use proptest::prelude::*;

use riffle::chapter::segment::{SPLIT_THRESHOLD, split_paragraph};
use riffle::highlight::{Color, Highlight, apply_highlights, flatten_markup, strip_marks};
use riffle::package::path::resolve_href;

proptest! {
    /// Text under the split threshold comes back as one unchanged piece.
    #[test]
    fn segmentation_idempotent_below_threshold(
        text in proptest::collection::vec(any::<char>(), 0..SPLIT_THRESHOLD - 1)
    ) {
        let text: String = text.into_iter().collect();
        prop_assume!(text.chars().count() < SPLIT_THRESHOLD);
        prop_assert_eq!(split_paragraph(&text), vec![text.clone()]);
    }

    /// Segmentation never loses or invents non-whitespace content.
    #[test]
    fn segmentation_preserves_content(n in 30usize..80) {
        let text = "그 집 앞을 지나면 늘 같은 개가 짖었다. ".repeat(n);
        let parts = split_paragraph(&text);
        let squash = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
        let rejoined: String = parts.concat();
        prop_assert_eq!(squash(&rejoined), squash(&text));
    }

    /// Resolved paths never retain dot segments or a leading slash.
    #[test]
    fn resolved_paths_are_normal(
        base_parts in proptest::collection::vec("[a-z]{1,6}", 1..4),
        rel_parts in proptest::collection::vec(prop_oneof!["[a-z]{1,6}".prop_map(String::from), Just("..".to_string())], 1..5),
    ) {
        let base = format!("{}/file.xhtml", base_parts.join("/"));
        let href = rel_parts.join("/");
        let resolved = resolve_href(&base, &href);
        prop_assert!(!resolved.starts_with('/'));
        prop_assert!(resolved.split('/').all(|seg| seg != ".." && seg != "."));
    }

    /// Applying any in-range highlight and stripping it reproduces the
    /// flattened text exactly.
    #[test]
    fn highlight_roundtrip_preserves_text(
        words in proptest::collection::vec("[a-z가-힣]{1,8}", 3..20),
        start_frac in 0.0f64..0.8,
        len in 2usize..30,
    ) {
        let text = words.join(" ");
        let markup = format!("<p>{text}</p>");
        let total = text.chars().count();
        prop_assume!(total > 4);

        let start = ((total as f64) * start_frac) as usize;
        let len = len.min(total - start);
        prop_assume!(len >= 2);

        let hl = Highlight {
            id: "prop".to_string(),
            chapter_id: "ch".to_string(),
            start_offset: start,
            end_offset: start + len,
            selected_text: String::new(),
            color: Color::Yellow,
            memo: None,
            page_number: 1,
        };

        let flat = flatten_markup(&markup);
        let applied = apply_highlights(&markup, &[hl]);
        prop_assert_eq!(flatten_markup(&applied), flat.clone());
        prop_assert_eq!(flatten_markup(&strip_marks(&applied)), flat);
    }
}
