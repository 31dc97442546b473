//! Structural metadata detection.
//!
//! Scans parent text for `Item N` / `Chapter N` / `Section N` markers (and
//! their Chinese equivalents, the book's secondary language) and records
//! the first match of each kind. Children inherit the parent's metadata
//! unchanged.

use regex::Regex;

use crate::core::{StructuralRef, Structure};
use crate::error::{ChunkingError, Result};

/// Compiled patterns for the three structural marker kinds.
#[derive(Debug)]
pub struct StructureScanner {
    item: Vec<Regex>,
    chapter: Vec<Regex>,
    section: Vec<Regex>,
}

impl StructureScanner {
    /// Compiles the marker patterns.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkingError::Regex`] if a pattern fails to compile.
    pub fn new() -> Result<Self> {
        let compile = |patterns: &[&str]| -> std::result::Result<Vec<Regex>, ChunkingError> {
            patterns
                .iter()
                .map(|p| Regex::new(p).map_err(ChunkingError::from))
                .collect()
        };

        Ok(Self {
            item: compile(&[r"(?i)\bitem\s+(\d+)", r"第\s*(\d+)\s*条"])?,
            chapter: compile(&[r"(?i)\bchapter\s+(\d+)", r"第\s*(\d+)\s*章"])?,
            section: compile(&[r"(?i)\bsection\s+(\d+)", r"第\s*(\d+)\s*节"])?,
        })
    }

    /// Scans `text` and returns the detected structural metadata.
    #[must_use]
    pub fn scan(&self, text: &str) -> Structure {
        Structure {
            item: first_match(&self.item, text),
            chapter: first_match(&self.chapter, text),
            section: first_match(&self.section, text),
        }
    }

    /// Byte offsets of every `Item N` header in `text`, used by the
    /// split-point scorer to avoid cutting right after a header.
    #[must_use]
    pub fn item_header_offsets(&self, text: &str) -> Vec<usize> {
        let mut offsets: Vec<usize> = self
            .item
            .iter()
            .flat_map(|re| re.find_iter(text).map(|m| m.start()))
            .collect();
        offsets.sort_unstable();
        offsets.dedup();
        offsets
    }
}

/// First match across the pattern variants, earliest in the text winning.
fn first_match(patterns: &[Regex], text: &str) -> Option<StructuralRef> {
    patterns
        .iter()
        .filter_map(|re| {
            re.captures(text).and_then(|caps| {
                let whole = caps.get(0)?;
                let digits = caps.get(1)?;
                Some((
                    whole.start(),
                    StructuralRef {
                        id: digits.as_str().to_string(),
                        label: whole.as_str().trim().to_string(),
                    },
                ))
            })
        })
        .min_by_key(|(start, _)| *start)
        .map(|(_, structural)| structural)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> StructureScanner {
        StructureScanner::new().unwrap()
    }

    #[test]
    fn test_scan_item() {
        let structure = scanner().scan("Item 3: Enforce the singleton property.");
        let item = structure.item.unwrap();
        assert_eq!(item.id, "3");
        assert_eq!(item.label, "Item 3");
        assert!(structure.chapter.is_none());
        assert!(structure.section.is_none());
    }

    #[test]
    fn test_scan_case_insensitive() {
        let structure = scanner().scan("see ITEM 17 and chapter 4 for details");
        assert_eq!(structure.item.unwrap().id, "17");
        assert_eq!(structure.chapter.unwrap().id, "4");
    }

    #[test]
    fn test_scan_secondary_language() {
        let structure = scanner().scan("第 3 条 用私有构造器或者枚举类型强化单例属性");
        let item = structure.item.unwrap();
        assert_eq!(item.id, "3");
        assert!(item.label.contains('条'));
    }

    #[test]
    fn test_first_match_wins() {
        let structure = scanner().scan("Item 5 comes before Item 9 in this span.");
        assert_eq!(structure.item.unwrap().id, "5");
    }

    #[test]
    fn test_earliest_across_languages() {
        let structure = scanner().scan("第2条 precedes Item 7 here.");
        assert_eq!(structure.item.unwrap().id, "2");
    }

    #[test]
    fn test_no_markers() {
        let structure = scanner().scan("plain prose without any markers");
        assert!(structure.is_empty());
    }

    #[test]
    fn test_item_header_offsets() {
        let text = "Item 1 starts here. Later Item 2 appears.";
        let offsets = scanner().item_header_offsets(text);
        assert_eq!(offsets.len(), 2);
        assert_eq!(offsets[0], 0);
        assert!(offsets[1] > 0);
    }

    #[test]
    fn test_word_boundary_required() {
        // "subitem 4" must not register as an Item marker.
        let structure = scanner().scan("the subitem 4 of the list");
        assert!(structure.item.is_none());
    }
}
