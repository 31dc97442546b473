//! The chunk index: child embeddings, segment texts, and parent lookup.
//!
//! Build-once-then-frozen: after [`Index::ingest`] or [`Index::load`] the
//! index is read-only, so concurrent searches need no locking. Segments
//! live in two flat arrays; children refer to parents by stable string id
//! only, and `parent_of` is a map lookup.

mod lexical;
mod snapshot;

pub use lexical::{score_text, tokenize_query};
pub use snapshot::{Snapshot, SnapshotChunk, SnapshotParent, split_parent_prefix};

use std::collections::HashMap;
use std::path::Path;

use rayon::prelude::*;

use crate::core::Segment;
use crate::embedding::cosine_similarity;
use crate::error::{IndexError, Result};

/// A search hit: child slot plus stage-local score.
///
/// Scores from different stages (raw cosine, RRF, rerank) are not
/// comparable with each other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Index into the child array.
    pub child: usize,
    /// Stage-local score.
    pub score: f32,
}

/// In-memory index over one ingested document.
#[derive(Debug, Default)]
pub struct Index {
    file_name: String,
    parents: Vec<Segment>,
    children: Vec<Segment>,
    embeddings: Vec<Vec<f32>>,
    parent_slots: HashMap<String, usize>,
    initialised: bool,
    placeholder_parents: bool,
}

impl Index {
    /// Creates an empty, uninitialised index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores parents, children, and child embeddings in insertion order
    /// and marks the index initialised.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::EmbeddingMismatch`] if the child and embedding
    /// lists differ in length.
    pub fn ingest(
        &mut self,
        file_name: impl Into<String>,
        parents: Vec<Segment>,
        children: Vec<Segment>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<()> {
        if children.len() != embeddings.len() {
            return Err(IndexError::EmbeddingMismatch {
                children: children.len(),
                embeddings: embeddings.len(),
            }
            .into());
        }

        self.parent_slots = parents
            .iter()
            .enumerate()
            .map(|(slot, p)| (p.parent_id.clone(), slot))
            .collect();
        self.file_name = file_name.into();
        self.parents = parents;
        self.children = children;
        self.embeddings = embeddings;
        self.initialised = true;
        self.placeholder_parents = false;

        tracing::info!(
            file = %self.file_name,
            parents = self.parents.len(),
            children = self.children.len(),
            "index ingested"
        );
        Ok(())
    }

    /// Whether the index holds an ingested document.
    #[must_use]
    pub const fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Whether parents were synthesised from a legacy snapshot, degrading
    /// small-to-big promotion.
    #[must_use]
    pub const fn has_placeholder_parents(&self) -> bool {
        self.placeholder_parents
    }

    /// Source document filename.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Parent segments in document order.
    #[must_use]
    pub fn parents(&self) -> &[Segment] {
        &self.parents
    }

    /// Child segments in document order.
    #[must_use]
    pub fn children(&self) -> &[Segment] {
        &self.children
    }

    /// The child at `slot`, if in range.
    #[must_use]
    pub fn child(&self, slot: usize) -> Option<&Segment> {
        self.children.get(slot)
    }

    /// Resolves a child's owning parent, or `None` when the id is unknown.
    #[must_use]
    pub fn parent_of(&self, child: &Segment) -> Option<&Segment> {
        self.parent_slots
            .get(&child.parent_id)
            .map(|&slot| &self.parents[slot])
    }

    /// Cosine-similarity scan of all child embeddings, top-k descending.
    #[must_use]
    pub fn vector_search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        if query.is_empty() || self.embeddings.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .embeddings
            .par_iter()
            .enumerate()
            .map(|(child, embedding)| SearchHit {
                child,
                score: cosine_similarity(query, embedding),
            })
            .collect();

        sort_hits(&mut hits);
        hits.truncate(k);
        hits
    }

    /// Lexical keyword scan over all child texts, top-k descending; hits
    /// with zero score are dropped.
    #[must_use]
    pub fn lexical_search(&self, query: &str, k: usize) -> Vec<SearchHit> {
        let tokens = tokenize_query(query);
        if tokens.is_empty() || self.children.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .children
            .par_iter()
            .enumerate()
            .filter_map(|(child, segment)| {
                let score = score_text(&tokens, &segment.text);
                (score > 0.0).then_some(SearchHit { child, score })
            })
            .collect();

        sort_hits(&mut hits);
        hits.truncate(k);
        hits
    }

    /// Persists the index to `path` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotInitialised`] before ingestion and
    /// [`IndexError::SnapshotWrite`] on I/O failure.
    pub fn save(&self, path: &Path) -> Result<()> {
        if !self.initialised {
            return Err(IndexError::NotInitialised.into());
        }
        let snapshot = Snapshot::build(
            &self.file_name,
            &self.parents,
            &self.children,
            &self.embeddings,
        );
        snapshot.write(path)?;
        tracing::info!(path = %path.display(), "snapshot written");
        Ok(())
    }

    /// Reloads an index from a snapshot.
    ///
    /// Legacy snapshots without parent texts load with placeholder parents
    /// pointing at each parent's first child; a WARNING is logged because
    /// small-to-big promotion degrades on such an index.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::EmbeddingMismatch`] (after deleting the file)
    /// when the snapshot is corrupt, or [`IndexError::Snapshot`] when it
    /// cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        let snapshot = Snapshot::read(path)?;

        let mut index = Self::new();
        let mut parents: Vec<Segment> = Vec::new();
        let mut parent_slots: HashMap<String, usize> = HashMap::new();
        let placeholder = snapshot.parents.is_empty();

        // Restore full parents when the snapshot carries them.
        for stored in &snapshot.parents {
            let mut parent = Segment::parent(parents.len(), stored.text.clone());
            parent.parent_id = stored.id.clone();
            parent.structure = stored.structure.clone();
            parent_slots.insert(stored.id.clone(), parents.len());
            parents.push(parent);
        }

        let mut children: Vec<Segment> = Vec::with_capacity(snapshot.chunks.len());
        let mut per_parent_counts: HashMap<String, usize> = HashMap::new();

        for chunk in &snapshot.chunks {
            let (parent_id, text) = split_parent_prefix(&chunk.text);

            let slot = if let Some(&slot) = parent_slots.get(&parent_id) {
                slot
            } else {
                // Legacy path: synthesise a placeholder parent from the
                // first child seen for this id.
                let mut parent = Segment::parent(parents.len(), text.to_string());
                parent.parent_id = parent_id.clone();
                parent_slots.insert(parent_id.clone(), parents.len());
                parents.push(parent);
                parents.len() - 1
            };

            let child_index = per_parent_counts.entry(parent_id.clone()).or_insert(0);
            let parent = &parents[slot];
            let child = Segment::child(parent, *child_index, text.to_string());
            *child_index += 1;
            children.push(child);
        }

        if placeholder {
            tracing::warn!(
                path = %path.display(),
                "snapshot has no parent texts; using first-child placeholders \
                 (small-to-big promotion will degrade)"
            );
        }

        #[allow(clippy::cast_possible_truncation)]
        let embeddings: Vec<Vec<f32>> = snapshot
            .embeddings
            .iter()
            .map(|v| v.iter().map(|&x| x as f32).collect())
            .collect();

        index.file_name = snapshot.file_name;
        index.parents = parents;
        index.children = children;
        index.embeddings = embeddings;
        index.parent_slots = parent_slots;
        index.initialised = true;
        index.placeholder_parents = placeholder;

        tracing::info!(
            path = %path.display(),
            parents = index.parents.len(),
            children = index.children.len(),
            "snapshot loaded"
        );
        Ok(index)
    }
}

fn sort_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.child.cmp(&b.child))
    });
}
