//! Sentence splitting for semantic chunking.
//!
//! Two-pass heuristic: the strict pass splits on `[.!?]` followed by
//! whitespace and an uppercase letter, or `[.!?]` followed by newlines.
//! When that yields fewer than ten sentences (dense code, unusual prose),
//! the relaxed pass splits on any `[.!?]` followed by whitespace.
//! Fragments shorter than ten characters are discarded.

use regex::Regex;

use crate::error::{ChunkingError, Result};

/// Minimum sentences the strict pass must produce before it is trusted.
const STRICT_PASS_MIN: usize = 10;

/// Minimum fragment length in characters.
const MIN_FRAGMENT_LEN: usize = 10;

/// Splits `text` into sentences using the two-pass heuristic.
///
/// Returns the surviving fragments in document order; may be empty when the
/// text has no sentence structure at all (callers fall back to recursive
/// splitting).
///
/// # Errors
///
/// Returns [`ChunkingError::Regex`] if a splitting pattern fails to
/// compile.
pub fn split_sentences(text: &str) -> Result<Vec<String>> {
    let strict_upper = Regex::new(r"[.!?]\s+\p{Lu}").map_err(ChunkingError::from)?;
    let strict_newline = Regex::new(r"[.!?]\n+").map_err(ChunkingError::from)?;

    let mut offsets: Vec<usize> = strict_upper
        .find_iter(text)
        .chain(strict_newline.find_iter(text))
        .map(|m| m.start() + 1)
        .collect();
    offsets.sort_unstable();
    offsets.dedup();

    let strict = cut(text, &offsets);
    if strict.len() >= STRICT_PASS_MIN {
        return Ok(strict);
    }

    let relaxed_re = Regex::new(r"[.!?]\s+").map_err(ChunkingError::from)?;
    let mut relaxed_offsets: Vec<usize> = relaxed_re
        .find_iter(text)
        .map(|m| m.start() + 1)
        .collect();
    relaxed_offsets.sort_unstable();
    relaxed_offsets.dedup();

    let relaxed = cut(text, &relaxed_offsets);

    // Keep whichever pass found more structure.
    if relaxed.len() > strict.len() {
        Ok(relaxed)
    } else {
        Ok(strict)
    }
}

/// Slices `text` at the given byte offsets, trimming and dropping short
/// fragments.
fn cut(text: &str, offsets: &[usize]) -> Vec<String> {
    let mut sentences = Vec::with_capacity(offsets.len() + 1);
    let mut start = 0;

    for &offset in offsets {
        if offset <= start || offset > text.len() || !text.is_char_boundary(offset) {
            continue;
        }
        push_fragment(&mut sentences, &text[start..offset]);
        start = offset;
    }
    if start < text.len() {
        push_fragment(&mut sentences, &text[start..]);
    }

    sentences
}

fn push_fragment(sentences: &mut Vec<String>, fragment: &str) {
    let trimmed = fragment.trim();
    if trimmed.chars().count() >= MIN_FRAGMENT_LEN {
        sentences.push(trimmed.to_string());
    }
}
