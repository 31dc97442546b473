//! Segment representation for the two-level document hierarchy.
//!
//! Parents are large, context-preserving spans produced by semantic
//! chunking; children are fixed 150-character windows within a parent and
//! are the unit of vector search. Segments are immutable once ingested.

use serde::{Deserialize, Serialize};

/// Whether a segment is a parent span or a child window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    /// Large-grain span preserving local context (400-1200 chars typical).
    Parent,
    /// Fixed window within a parent; the unit of vector search.
    Child,
}

/// A reference to a structural marker found in the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralRef {
    /// Digits-only identifier extracted from the marker (e.g. `"3"`).
    pub id: String,
    /// The matched text as it appears in the document (e.g. `"Item 3"`).
    pub label: String,
}

/// Structural metadata detected on a parent and inherited by its children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    /// First `Item N` marker in the span, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<StructuralRef>,
    /// First `Chapter N` marker in the span, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter: Option<StructuralRef>,
    /// First `Section N` marker in the span, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<StructuralRef>,
}

impl Structure {
    /// Returns `true` when no structural markers were detected.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.item.is_none() && self.chapter.is_none() && self.section.is_none()
    }

    /// Human-readable label for prompt building, preferring the most
    /// specific marker: item, then section, then chapter.
    #[must_use]
    pub fn display_label(&self) -> Option<&str> {
        self.item
            .as_ref()
            .or(self.section.as_ref())
            .or(self.chapter.as_ref())
            .map(|r| r.label.as_str())
    }
}

/// A contiguous text span from the source document.
///
/// # Examples
///
/// ```
/// use tome_rs::core::{Segment, SegmentKind};
///
/// let parent = Segment::parent(0, "Item 3: Enforce the singleton.".to_string());
/// assert_eq!(parent.kind, SegmentKind::Parent);
/// assert_eq!(parent.parent_id, "0");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Immutable text of the span.
    pub text: String,
    /// Parent or child.
    pub kind: SegmentKind,
    /// Identifier of the owning parent. Parents carry their own id here so
    /// `parent_of(child).parent_id == child.parent_id` holds.
    pub parent_id: String,
    /// Ordinal of the owning parent within the document (monotonic).
    pub parent_index: usize,
    /// Ordinal within the parent (children only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_index: Option<usize>,
    /// Structural metadata, inherited unchanged from parent to children.
    #[serde(default)]
    pub structure: Structure,
}

impl Segment {
    /// Creates a parent segment. The parent id is the decimal rendering of
    /// its document ordinal, which is stable across save/load.
    #[must_use]
    pub fn parent(parent_index: usize, text: String) -> Self {
        Self {
            text,
            kind: SegmentKind::Parent,
            parent_id: parent_index.to_string(),
            parent_index,
            child_index: None,
            structure: Structure::default(),
        }
    }

    /// Creates a child window belonging to `parent`.
    #[must_use]
    pub fn child(parent: &Self, child_index: usize, text: String) -> Self {
        Self {
            text,
            kind: SegmentKind::Child,
            parent_id: parent.parent_id.clone(),
            parent_index: parent.parent_index,
            child_index: Some(child_index),
            structure: parent.structure.clone(),
        }
    }

    /// Returns the segment length in characters.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Returns `true` for parent segments.
    #[must_use]
    pub fn is_parent(&self) -> bool {
        self.kind == SegmentKind::Parent
    }
}
