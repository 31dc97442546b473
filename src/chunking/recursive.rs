//! Naive recursive fallback splitter.
//!
//! Used when sentence detection finds no usable structure (tables, OCR
//! noise, wall-of-code documents). Produces ~800-character chunks with a
//! 50-character overlap, preferring paragraph, line, and word boundaries
//! in that order.

use crate::chunking::{FALLBACK_CHUNK_SIZE, FALLBACK_OVERLAP};

/// Splits `text` into chunks of at most `chunk_size` characters with
/// `overlap` characters carried between consecutive chunks.
#[must_use]
pub fn recursive_split(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    if char_count <= chunk_size {
        return vec![text.to_string()];
    }

    let stride = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < char_count {
        let hard_end = (start + chunk_size).min(char_count);
        let end = if hard_end == char_count {
            hard_end
        } else {
            best_break(text, &boundaries, start, hard_end)
        };

        chunks.push(text[boundaries[start]..boundaries[end]].to_string());

        if end == char_count {
            break;
        }
        // Step relative to the chosen end so boundary snapping never stalls.
        start = end.saturating_sub(overlap).max(start + 1).min(start + stride);
    }

    chunks
}

/// Convenience wrapper with the calibrated 800/50 parameters.
#[must_use]
pub fn recursive_split_default(text: &str) -> Vec<String> {
    recursive_split(text, FALLBACK_CHUNK_SIZE, FALLBACK_OVERLAP)
}

/// Searches backwards from `hard_end` for a paragraph, line, or word break,
/// looking at most an eighth of the chunk back.
fn best_break(text: &str, boundaries: &[usize], start: usize, hard_end: usize) -> usize {
    let window = (hard_end - start) / 8;
    let search_start = hard_end.saturating_sub(window).max(start + 1);
    let region = &text[boundaries[search_start]..boundaries[hard_end]];

    for pattern in ["\n\n", "\n", " "] {
        if let Some(pos) = region.rfind(pattern) {
            let byte_pos = boundaries[search_start] + pos + pattern.len();
            if let Ok(char_pos) = boundaries.binary_search(&byte_pos)
                && char_pos > start
            {
                return char_pos;
            }
        }
    }

    hard_end
}
