//! Semantic chunking of a document into a Parent/Child hierarchy.
//!
//! Parents come from embedding-guided breakpoint detection over sentences
//! ([`SemanticChunker`]), with a naive recursive splitter as fallback when
//! sentence detection finds nothing useful. Children are fixed 150-char
//! windows with a 30-char overlap, carrying the parent's structural
//! metadata.

mod recursive;
mod semantic;
mod sentence;
mod structure;
mod window;

pub use recursive::{recursive_split, recursive_split_default};
pub use semantic::SemanticChunker;
pub use sentence::split_sentences;
pub use structure::StructureScanner;
pub use window::child_windows;

use crate::core::Segment;

/// Minimum parent size before a soft semantic breakpoint may fire.
pub const PARENT_MIN_SIZE: usize = 400;

/// Minimum parent size before a hard semantic breakpoint may fire.
pub const PARENT_HARD_MIN_SIZE: usize = 200;

/// Maximum parent size; longer chunks are split at a scored position.
pub const PARENT_MAX_SIZE: usize = 1200;

/// Child window size in characters.
pub const CHILD_WINDOW: usize = 150;

/// Child window stride in characters (overlap = window - stride).
pub const CHILD_STRIDE: usize = 120;

/// Chunk size for the naive recursive fallback splitter.
pub const FALLBACK_CHUNK_SIZE: usize = 800;

/// Overlap for the naive recursive fallback splitter.
pub const FALLBACK_OVERLAP: usize = 50;

/// Configuration for the semantic chunker.
///
/// Defaults match the calibrated pipeline; the breakpoint thresholds are
/// exposed here rather than baked in.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Cosine-similarity threshold for a soft breakpoint (with at least
    /// [`PARENT_MIN_SIZE`] accumulated).
    pub breakpoint_threshold: f32,
    /// Cosine-similarity threshold for a hard breakpoint (with at least
    /// [`PARENT_HARD_MIN_SIZE`] accumulated).
    pub hard_breakpoint_threshold: f32,
    /// Minimum accumulated size for a soft breakpoint.
    pub min_chunk_size: usize,
    /// Minimum accumulated size for a hard breakpoint.
    pub hard_min_chunk_size: usize,
    /// Maximum parent size.
    pub max_chunk_size: usize,
    /// Sentences at or below this length are not embedded.
    pub min_sentence_len: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            breakpoint_threshold: 0.7,
            hard_breakpoint_threshold: 0.56,
            min_chunk_size: PARENT_MIN_SIZE,
            hard_min_chunk_size: PARENT_HARD_MIN_SIZE,
            max_chunk_size: PARENT_MAX_SIZE,
            min_sentence_len: 10,
        }
    }
}

/// Output of chunking: ordered parents plus the flat ordered child list.
#[derive(Debug, Clone)]
pub struct ChunkedDocument {
    /// Parent segments in document order.
    pub parents: Vec<Segment>,
    /// Child segments in (parent, window) order.
    pub children: Vec<Segment>,
}

impl ChunkedDocument {
    /// Total number of parents.
    #[must_use]
    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }

    /// Total number of children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let cfg = ChunkerConfig::default();
        assert!((cfg.breakpoint_threshold - 0.7).abs() < f32::EPSILON);
        assert!((cfg.hard_breakpoint_threshold - 0.56).abs() < f32::EPSILON);
        assert_eq!(cfg.min_chunk_size, 400);
        assert_eq!(cfg.hard_min_chunk_size, 200);
        assert_eq!(cfg.max_chunk_size, 1200);
        assert_eq!(cfg.min_sentence_len, 10);
    }

    #[test]
    fn test_window_overlap_constant() {
        assert_eq!(CHILD_WINDOW - CHILD_STRIDE, 30);
    }
}
