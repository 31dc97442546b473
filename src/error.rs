//! Error types for the retrieval core.
//!
//! This module provides the error hierarchy using `thiserror` for chunking,
//! indexing, model I/O, evaluation, and serving.

use thiserror::Error;

/// Result type alias for retrieval-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for all retrieval-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Chunking-related errors (document segmentation).
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    /// Index-related errors (ingestion, search, persistence).
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Model errors (generator or embedder endpoints).
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Evaluation harness errors.
    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),

    /// Empty input to a public entry point.
    #[error("empty input: {context}")]
    EmptyInput {
        /// Which entry point received the empty input.
        context: String,
    },

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(String),
}

/// Chunking-specific errors for document segmentation.
#[derive(Error, Debug)]
pub enum ChunkingError {
    /// The source document contained no text.
    #[error("document is empty")]
    EmptyDocument,

    /// Invalid chunker configuration.
    #[error("invalid chunker configuration: {reason}")]
    InvalidConfig {
        /// Reason the configuration is invalid.
        reason: String,
    },

    /// Regex compilation error.
    #[error("regex error: {0}")]
    Regex(String),
}

/// Index-specific errors.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Index used before ingestion or snapshot load.
    #[error("index not initialised; ingest a document first")]
    NotInitialised,

    /// Child and embedding lists disagree in length.
    #[error("embedding mismatch: {children} children vs {embeddings} embeddings")]
    EmbeddingMismatch {
        /// Number of child segments.
        children: usize,
        /// Number of stored embeddings.
        embeddings: usize,
    },

    /// Snapshot file could not be read or parsed.
    #[error("snapshot error: {path}: {reason}")]
    Snapshot {
        /// Path to the snapshot file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Snapshot write failed.
    #[error("failed to write snapshot: {path}: {reason}")]
    SnapshotWrite {
        /// Path to the snapshot file.
        path: String,
        /// Reason for failure.
        reason: String,
    },
}

/// Errors raised by the generator or embedder endpoints.
///
/// These are the only errors that cross the request boundary with a stable
/// category; everything else inside the pipeline degrades with a fallback.
#[derive(Error, Debug, Clone)]
pub enum ModelError {
    /// The request was cancelled or its deadline expired.
    #[error("request cancelled")]
    Cancelled,

    /// The endpoint rate-limited the caller (HTTP 429).
    #[error("rate limited by model endpoint: {message}")]
    RateLimited {
        /// Human-readable cause from the endpoint.
        message: String,
    },

    /// Authentication failed (HTTP 401). Fatal for the session.
    #[error("unauthorized by model endpoint: {message}")]
    Unauthorized {
        /// Human-readable cause from the endpoint.
        message: String,
    },

    /// The endpoint failed server-side (HTTP 5xx).
    #[error("upstream server error ({status}): {message}")]
    UpstreamServer {
        /// HTTP status code.
        status: u16,
        /// Human-readable cause from the endpoint.
        message: String,
    },

    /// Transport-level failure (connection, protocol, serialization).
    #[error("model request failed: {0}")]
    Request(String),

    /// The endpoint returned an empty or unusable completion.
    #[error("model returned no usable output")]
    EmptyResponse,
}

/// Evaluation harness errors.
#[derive(Error, Debug)]
pub enum EvalError {
    /// No test set is available for a batch run.
    #[error("test set is empty or missing: {path}")]
    MissingTestSet {
        /// Expected test-set path.
        path: String,
    },

    /// Report or history persistence failed.
    #[error("failed to write evaluation output: {path}: {reason}")]
    WriteFailed {
        /// Output path.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Serialization/deserialization of an evaluation artifact failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ModelError {
    /// Returns `true` when retrying the same request cannot help
    /// (authentication failures and cancellations).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::Cancelled)
    }

    /// Returns `true` for rate-limit responses, which callers propagate so
    /// batch drivers can pause instead of retrying blindly.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

// Implement From traits for standard library errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<regex::Error> for ChunkingError {
    fn from(err: regex::Error) -> Self {
        Self::Regex(err.to_string())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
