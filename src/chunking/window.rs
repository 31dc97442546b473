//! Fixed-window child creation.
//!
//! Each parent is tiled with 150-character windows sliding by 120
//! characters (30-character overlap); the final window may be shorter.
//! Windows are cut on character boundaries so multi-byte text never
//! produces invalid slices.

use crate::chunking::{CHILD_STRIDE, CHILD_WINDOW};
use crate::core::Segment;

/// Produces the child segments for `parent`.
///
/// Children inherit the parent's structural metadata and receive their
/// ordinal as `child_index`.
#[must_use]
pub fn child_windows(parent: &Segment) -> Vec<Segment> {
    let boundaries: Vec<usize> = parent
        .text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(parent.text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    if char_count == 0 {
        return Vec::new();
    }

    let mut children = Vec::new();
    let mut start = 0;
    let mut child_index = 0;

    while start < char_count {
        let end = (start + CHILD_WINDOW).min(char_count);
        let slice = &parent.text[boundaries[start]..boundaries[end]];
        children.push(Segment::child(parent, child_index, slice.to_string()));
        child_index += 1;

        if end == char_count {
            break;
        }
        start += CHILD_STRIDE;
    }

    children
}
