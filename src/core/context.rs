//! Per-request cancellation and deadline propagation.
//!
//! Every retrieval, answering, or evaluation request carries a
//! [`RequestContext`]. It is checked at each suspension point; cancellation
//! or an expired deadline surfaces as [`ModelError::Cancelled`] and the
//! request performs no further mutation.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::ModelError;

/// Cancellation token plus optional deadline for one logical request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Creates a context with no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Creates a child context sharing this context's cancellation; child
    /// cancellation does not propagate upward.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    /// Requests cancellation of this context and all children.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` once cancelled or past the deadline.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Errors with [`ModelError::Cancelled`] once cancelled or expired.
    /// Called at every suspension point of the pipeline.
    pub fn ensure_active(&self) -> Result<(), ModelError> {
        if self.is_cancelled() {
            Err(ModelError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// The underlying token, for wiring into select loops.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}
