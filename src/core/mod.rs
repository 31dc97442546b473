//! Core domain types: segments, dialogue memory, request context.

mod context;
mod memory;
mod segment;

pub use context::RequestContext;
pub use memory::{DialogueMemory, MEMORY_CAPACITY, Turn};
pub use segment::{Segment, SegmentKind, StructuralRef, Structure};
