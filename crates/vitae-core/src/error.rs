//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type shared by the coordinator and every store.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The requested aggregate or child document does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness rule was violated (one resume per owner, duplicate id).
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A batch or single child insert failed or timed out.
    #[error("write to {collection} failed: {reason}")]
    ChildWriteFailed {
        /// Collection the write was addressed to.
        collection: &'static str,
        /// Underlying failure description.
        reason: String,
    },

    /// A referenced child id failed to resolve while reassembling an aggregate.
    #[error("aggregate {aggregate_id} is inconsistent: {detail}")]
    InconsistentAggregate {
        /// The aggregate whose references are broken.
        aggregate_id: Uuid,
        /// Which child failed and why.
        detail: String,
    },

    /// Optimistic concurrency conflict on a versioned document.
    #[error(
        "concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// Input rejected before any store call.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Convenience constructor for `ChildWriteFailed`.
    #[must_use]
    pub fn child_write_failed(collection: &'static str, reason: impl Into<String>) -> Self {
        Self::ChildWriteFailed {
            collection,
            reason: reason.into(),
        }
    }

    /// Convenience constructor for `InconsistentAggregate`.
    #[must_use]
    pub fn inconsistent(aggregate_id: Uuid, detail: impl Into<String>) -> Self {
        Self::InconsistentAggregate {
            aggregate_id,
            detail: detail.into(),
        }
    }
}
