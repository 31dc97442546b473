//! # tome-rs
//!
//! Retrieval-augmented question answering over a single large reference
//! book. A document is chunked once into a Parent/Child segment hierarchy,
//! child windows are embedded and indexed, and free-form questions run
//! through a multi-stage pipeline: language normalisation, step-back
//! abstraction, HyDE expansion, dual hybrid search, reciprocal-rank
//! fusion, feature-weighted reranking, and small-to-big promotion.
//!
//! ## Features
//!
//! - **Chunking**: embedding-guided semantic parents with fixed-window
//!   children and structural (`Item`/`Chapter`/`Section`) metadata
//! - **Index**: brute-force cosine plus lexical keyword search over child
//!   windows, persisted as a single JSON snapshot
//! - **Answering**: streamed, grounded answers with bounded per-session
//!   dialogue memory
//! - **Evaluation**: synthetic test sets, generator-as-judge scoring, and
//!   intrinsic metrics with Markdown/JSON reports

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod answer;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod core;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod expand;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod retrieval;
pub mod server;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use crate::core::{
    DialogueMemory, RequestContext, Segment, SegmentKind, StructuralRef, Structure,
};

// Re-export configuration
pub use config::{ModelConfig, RetrievalOptions};

// Re-export chunking types
pub use chunking::{ChunkedDocument, ChunkerConfig, SemanticChunker};

// Re-export index types
pub use index::{Index, SearchHit, Snapshot};

// Re-export embedding types
pub use embedding::{DEFAULT_DIMENSIONS, Embedder, HashEmbedder, OpenAiEmbedder, cosine_similarity};

// Re-export generation types
pub use generation::{ChatMessage, ChatRole, Generator, OpenAiGenerator, TokenStream};

// Re-export pipeline types
pub use answer::Answerer;
pub use eval::{EvalPaths, Evaluator};
pub use expand::{ExpandedQuery, QueryExpander};
pub use ingest::ingest_document;
pub use retrieval::{Passage, Retrieval, Retriever};
