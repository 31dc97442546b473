//! Bounded dialogue memory for a single chat session.
//!
//! Memory holds the rolling user/assistant turns that are replayed into the
//! augmented prompt. Capacity is fixed; the oldest turn is evicted first.

use crate::generation::{ChatMessage, ChatRole};

/// Maximum number of turns retained per session.
pub const MEMORY_CAPACITY: usize = 10;

/// A single remembered turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Who produced the turn (user or assistant).
    pub role: ChatRole,
    /// Turn text.
    pub text: String,
}

/// Bounded, oldest-first-evicting dialogue memory.
///
/// # Examples
///
/// ```
/// use tome_rs::core::DialogueMemory;
///
/// let mut memory = DialogueMemory::new();
/// memory.record_exchange("hello", "hi there");
/// assert_eq!(memory.len(), 2);
/// memory.clear();
/// assert!(memory.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DialogueMemory {
    turns: Vec<Turn>,
}

impl DialogueMemory {
    /// Creates an empty memory.
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Appends a completed user/assistant exchange, evicting the oldest
    /// turns once capacity is exceeded.
    pub fn record_exchange(&mut self, user: &str, assistant: &str) {
        self.turns.push(Turn {
            role: ChatRole::User,
            text: user.to_string(),
        });
        self.turns.push(Turn {
            role: ChatRole::Assistant,
            text: assistant.to_string(),
        });
        while self.turns.len() > MEMORY_CAPACITY {
            self.turns.remove(0);
        }
    }

    /// Clears all remembered turns (also used on mode switches).
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Number of remembered turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the memory holds no turns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Remembered turns, oldest first.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Renders the memory as chat messages for prompt assembly.
    #[must_use]
    pub fn as_messages(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .map(|t| ChatMessage {
                role: t.role,
                text: t.text.clone(),
            })
            .collect()
    }
}
