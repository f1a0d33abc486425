//! Paragraph auto-split heuristic.
//!
//! Some sources carry entire chapters as one unsegmented text block. Blocks
//! at or past [`SPLIT_THRESHOLD`] characters are resegmented at sentence
//! boundaries — sentence-final punctuation that follows a Korean terminal
//! particle — and regrouped into paragraphs capped by length and sentence
//! count. When too few boundaries are found, splitting falls back to the
//! nearest whitespace/punctuation boundary around a fixed length target.
//!
//! This is a best-effort heuristic, not a general sentence tokenizer.

/// Blocks at least this many characters long get resegmented.
pub const SPLIT_THRESHOLD: usize = 500;

/// Paragraph length target (characters) for grouping and fallback splitting.
const TARGET_LEN: usize = 280;

/// Maximum sentences grouped into one paragraph.
const MAX_SENTENCES: usize = 4;

/// Minimum sentence boundaries required before the sentence-based path is
/// trusted over the length-based fallback.
const MIN_SENTENCES: usize = 3;

/// Sentence-final terminal particles: a boundary is one of these immediately
/// followed by `.`, `!`, or `?`.
const TERMINAL_PARTICLES: &[char] = &[
    '다', '요', '죠', '음', '임', '함', '됨', '뇨', '까', '지', '네', '세', '라', '고', '며',
];

/// Split one oversized text block into paragraph-sized pieces.
///
/// Idempotent on text under the threshold: such input comes back as a single
/// unchanged piece.
pub fn split_paragraph(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() < SPLIT_THRESHOLD {
        return vec![text.to_string()];
    }

    let sentences = split_sentences(&chars);
    if sentences.len() < MIN_SENTENCES {
        return split_by_length(&chars);
    }

    group_sentences(sentences)
}

/// Cut at every terminal-particle + punctuation boundary. Text without a
/// trailing boundary merges into the final sentence.
fn split_sentences(chars: &[char]) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0usize;

    let mut i = 0;
    while i + 1 < chars.len() {
        if TERMINAL_PARTICLES.contains(&chars[i]) && matches!(chars[i + 1], '.' | '!' | '?') {
            let sentence: String = chars[start..=i + 1].iter().collect();
            let sentence = sentence.trim().to_string();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            i += 2;
            start = i;
            continue;
        }
        i += 1;
    }

    let remainder: String = chars[start..].iter().collect();
    let remainder = remainder.trim().to_string();
    if !remainder.is_empty() {
        match sentences.last_mut() {
            Some(last) => {
                last.push(' ');
                last.push_str(&remainder);
            }
            None => sentences.push(remainder),
        }
    }

    sentences
}

/// Group sentences into paragraphs capped at ~[`TARGET_LEN`] characters or
/// [`MAX_SENTENCES`] sentences.
fn group_sentences(sentences: Vec<String>) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;

    for sentence in sentences {
        let cur_len = current.chars().count();
        let sent_len = sentence.chars().count();
        if !current.is_empty() && (cur_len + sent_len > TARGET_LEN || count >= MAX_SENTENCES) {
            paragraphs.push(std::mem::take(&mut current));
            count = 0;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
        count += 1;
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs
}

/// Length-based fallback: cut near the target at punctuation, then
/// whitespace, then force the cut, repeating until the remainder is short.
fn split_by_length(chars: &[char]) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut rest: &[char] = chars;

    while rest.len() > TARGET_LEN {
        let upper = TARGET_LEN.min(rest.len() - 1);
        let lower = TARGET_LEN / 2;

        let mut cut = None;
        for i in (lower..=upper).rev() {
            if matches!(rest[i], '.' | '!' | '?') {
                cut = Some(i + 1);
                break;
            }
        }
        if cut.is_none() {
            for i in (lower..=upper).rev() {
                if rest[i] == ' ' || rest[i] == ',' {
                    cut = Some(i + 1);
                    break;
                }
            }
        }
        let cut = cut.unwrap_or(TARGET_LEN);

        let piece: String = rest[..cut].iter().collect();
        let piece = piece.trim().to_string();
        if !piece.is_empty() {
            paragraphs.push(piece);
        }
        rest = &rest[cut..];
    }

    let piece: String = rest.iter().collect();
    let piece = piece.trim().to_string();
    if !piece.is_empty() {
        paragraphs.push(piece);
    }

    paragraphs
}
