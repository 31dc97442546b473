//! System prompt and template builders for answering.
//!
//! The system message states the assistant's role, demands grounded
//! answers, asks for Item/Chapter citations where labels exist, and then
//! appends each retrieved passage under a numbered `[Source k: …]` header.

use std::fmt::Write;

use crate::retrieval::Passage;

/// System prompt prefix for grounded book question answering.
pub const ANSWER_SYSTEM_PROMPT: &str = "You are an assistant answering questions about a \
technical reference book. Ground every statement in the source passages provided below; if the \
sources do not contain the answer, say so instead of speculating. When a source carries an Item \
or Chapter label, cite it in your answer (for example: \"see Item 3\"). Answer in the language \
of the user's question.";

/// Builds the full system message: role instructions plus labelled sources.
#[must_use]
pub fn build_system_prompt(passages: &[Passage]) -> String {
    let mut prompt = String::from(ANSWER_SYSTEM_PROMPT);

    if passages.is_empty() {
        prompt.push_str(
            "\n\nNo sources were retrieved for this question; say that the book does not appear \
             to cover it.",
        );
        return prompt;
    }

    prompt.push_str("\n\nSources:\n");
    for (i, passage) in passages.iter().enumerate() {
        let number = i + 1;
        let label = passage
            .segment
            .structure
            .display_label()
            .map_or_else(|| number.to_string(), ToString::to_string);
        let _ = write!(
            prompt,
            "\n[Source {number}: {label}]\n{}\n",
            passage.segment.text
        );
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Segment, StructuralRef};

    fn passage(parent_index: usize, text: &str, item: Option<(&str, &str)>) -> Passage {
        let mut segment = Segment::parent(parent_index, text.to_string());
        if let Some((id, label)) = item {
            segment.structure.item = Some(StructuralRef {
                id: id.to_string(),
                label: label.to_string(),
            });
        }
        Passage {
            segment,
            score: 0.9,
        }
    }

    #[test]
    fn test_empty_sources() {
        let prompt = build_system_prompt(&[]);
        assert!(prompt.contains("No sources were retrieved"));
    }

    #[test]
    fn test_labelled_source() {
        let prompt = build_system_prompt(&[passage(
            0,
            "Enforce the singleton property.",
            Some(("3", "Item 3")),
        )]);
        assert!(prompt.contains("Source 1: Item 3"));
        assert!(prompt.contains("Enforce the singleton property."));
    }

    #[test]
    fn test_unlabelled_source_uses_ordinal() {
        let prompt = build_system_prompt(&[passage(2, "Plain passage text.", None)]);
        assert!(prompt.contains("[Source 1: 1]"));
    }

    #[test]
    fn test_source_numbering() {
        let prompt = build_system_prompt(&[
            passage(0, "first", Some(("3", "Item 3"))),
            passage(1, "second", None),
            passage(2, "third", Some(("9", "Item 9"))),
        ]);
        assert!(prompt.contains("Source 1: Item 3"));
        assert!(prompt.contains("[Source 2: 2]"));
        assert!(prompt.contains("Source 3: Item 9"));
    }

    #[test]
    fn test_instructions_present() {
        let prompt = build_system_prompt(&[]);
        assert!(prompt.contains("Ground every statement"));
        assert!(prompt.contains("cite"));
    }
}
