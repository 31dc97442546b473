//! Index snapshot persistence (`vector-store.json`).
//!
//! The on-disk form stores the document name, child texts (each prefixed
//! with an inline `<!--PARENT_ID:…-->` marker), and the child embeddings
//! as f64 for portability. Writers also emit a `parents` array so a reload
//! restores full parent texts; legacy snapshots without it still load, with
//! placeholder parents synthesised from each parent's first child.
//!
//! Writes are atomic: serialise to a temporary sibling, then rename.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Segment, Structure};
use crate::error::{IndexError, Result};

/// Inline prefix carrying the parent id on each persisted child text.
const PARENT_ID_OPEN: &str = "<!--PARENT_ID:";
const PARENT_ID_CLOSE: &str = "-->";

/// One persisted child text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotChunk {
    /// Child text with the `<!--PARENT_ID:…-->` prefix.
    pub text: String,
}

/// One persisted parent (extension over the legacy format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotParent {
    /// Parent id as referenced by child prefixes.
    pub id: String,
    /// Full parent text.
    pub text: String,
    /// Structural metadata.
    #[serde(default)]
    pub structure: Structure,
}

/// The persisted snapshot document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Source document filename.
    #[serde(rename = "fileName")]
    pub file_name: String,
    /// Child texts, in child order.
    pub chunks: Vec<SnapshotChunk>,
    /// Child embeddings, parallel to `chunks`.
    pub embeddings: Vec<Vec<f64>>,
    /// Parent texts (absent in legacy snapshots).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<SnapshotParent>,
}

impl Snapshot {
    /// Builds a snapshot from index contents.
    #[must_use]
    pub fn build(
        file_name: &str,
        parents: &[Segment],
        children: &[Segment],
        embeddings: &[Vec<f32>],
    ) -> Self {
        let chunks = children
            .iter()
            .map(|child| SnapshotChunk {
                text: format!(
                    "{PARENT_ID_OPEN}{}{PARENT_ID_CLOSE}{}",
                    child.parent_id, child.text
                ),
            })
            .collect();

        let embeddings = embeddings
            .iter()
            .map(|v| v.iter().map(|&x| f64::from(x)).collect())
            .collect();

        let parents = parents
            .iter()
            .map(|parent| SnapshotParent {
                id: parent.parent_id.clone(),
                text: parent.text.clone(),
                structure: parent.structure.clone(),
            })
            .collect();

        Self {
            file_name: file_name.to_string(),
            chunks,
            embeddings,
            parents,
        }
    }

    /// Writes the snapshot atomically: serialise to `<path>.tmp`, rename
    /// over `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let display = path.display().to_string();
        let json = serde_json::to_string_pretty(self).map_err(|e| IndexError::SnapshotWrite {
            path: display.clone(),
            reason: e.to_string(),
        })?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| IndexError::SnapshotWrite {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        std::fs::rename(&tmp, path).map_err(|e| IndexError::SnapshotWrite {
            path: display,
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Reads and validates a snapshot.
    ///
    /// On a chunk/embedding length mismatch the corrupt file is deleted and
    /// [`IndexError::EmbeddingMismatch`] is returned so the caller
    /// re-ingests.
    pub fn read(path: &Path) -> Result<Self> {
        let path_display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|e| IndexError::Snapshot {
            path: path_display.clone(),
            reason: e.to_string(),
        })?;
        let snapshot: Self =
            serde_json::from_str(&raw).map_err(|e| IndexError::Snapshot {
                path: path_display.clone(),
                reason: e.to_string(),
            })?;

        if snapshot.chunks.len() != snapshot.embeddings.len() {
            tracing::warn!(
                path = %path_display,
                chunks = snapshot.chunks.len(),
                embeddings = snapshot.embeddings.len(),
                "snapshot corrupt; deleting for re-ingestion"
            );
            let _ = std::fs::remove_file(path);
            return Err(IndexError::EmbeddingMismatch {
                children: snapshot.chunks.len(),
                embeddings: snapshot.embeddings.len(),
            }
            .into());
        }

        Ok(snapshot)
    }
}

/// Splits a persisted child text into `(parent_id, text)`.
///
/// Children without a parseable prefix keep their full text and fall into
/// a synthetic parent keyed by the empty id.
#[must_use]
pub fn split_parent_prefix(text: &str) -> (String, &str) {
    if let Some(rest) = text.strip_prefix(PARENT_ID_OPEN)
        && let Some(close) = rest.find(PARENT_ID_CLOSE)
    {
        let id = rest[..close].to_string();
        let body = &rest[close + PARENT_ID_CLOSE.len()..];
        return (id, body);
    }
    (String::new(), text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Segment;
    use tempfile::TempDir;

    fn sample_snapshot() -> Snapshot {
        let parent = Segment::parent(0, "parent text that holds two children".to_string());
        let children = vec![
            Segment::child(&parent, 0, "parent text that".to_string()),
            Segment::child(&parent, 1, "holds two children".to_string()),
        ];
        let embeddings = vec![vec![0.25f32, -0.5], vec![1.0, 0.125]];
        Snapshot::build("book.pdf", &[parent], &children, &embeddings)
    }

    #[test]
    fn test_build_prefixes_parent_id() {
        let snapshot = sample_snapshot();
        assert_eq!(snapshot.chunks.len(), 2);
        assert!(snapshot.chunks[0].text.starts_with("<!--PARENT_ID:0-->"));
        assert_eq!(snapshot.parents.len(), 1);
        assert_eq!(snapshot.parents[0].id, "0");
    }

    #[test]
    fn test_split_parent_prefix() {
        let (id, body) = split_parent_prefix("<!--PARENT_ID:42-->hello");
        assert_eq!(id, "42");
        assert_eq!(body, "hello");
    }

    #[test]
    fn test_split_parent_prefix_missing() {
        let (id, body) = split_parent_prefix("no prefix here");
        assert!(id.is_empty());
        assert_eq!(body, "no prefix here");
    }

    #[test]
    fn test_write_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vector-store.json");

        let snapshot = sample_snapshot();
        snapshot.write(&path).unwrap();

        let loaded = Snapshot::read(&path).unwrap();
        assert_eq!(loaded.file_name, "book.pdf");
        assert_eq!(loaded.chunks.len(), 2);
        assert_eq!(loaded.embeddings.len(), 2);
        assert_eq!(loaded.parents.len(), 1);
        // f32 -> f64 -> f32 is lossless.
        assert!((loaded.embeddings[0][0] - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_write_is_pretty_utf8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vector-store.json");
        sample_snapshot().write(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains('\n'));
        assert!(raw.contains("\"fileName\""));
    }

    #[test]
    fn test_corrupt_snapshot_deleted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vector-store.json");

        let mut snapshot = sample_snapshot();
        snapshot.embeddings.pop(); // force a length mismatch
        let json = serde_json::to_string(&snapshot).unwrap();
        std::fs::write(&path, json).unwrap();

        let err = Snapshot::read(&path).unwrap_err();
        assert!(err.to_string().contains("embedding mismatch"));
        assert!(!path.exists(), "corrupt snapshot must be deleted");
    }

    #[test]
    fn test_legacy_snapshot_without_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vector-store.json");

        let json = r#"{
            "fileName": "book.pdf",
            "chunks": [{"text": "<!--PARENT_ID:0-->legacy child"}],
            "embeddings": [[0.5, 0.5]]
        }"#;
        std::fs::write(&path, json).unwrap();

        let loaded = Snapshot::read(&path).unwrap();
        assert!(loaded.parents.is_empty());
        assert_eq!(loaded.chunks.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");
        assert!(Snapshot::read(&path).is_err());
    }
}
