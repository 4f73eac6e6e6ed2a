//! Outcome types for multi-step operations that cannot commit atomically.

use serde::Serialize;
use uuid::Uuid;
use vitae_core::error::DomainError;

/// A child document that may exist in storage without being referenced by
/// any resume. Reconcilable by an owner-id sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Orphan {
    /// Collection holding the document.
    pub collection: &'static str,
    /// The document id.
    pub id: Uuid,
}

impl Orphan {
    /// Creates an orphan record.
    #[must_use]
    pub fn new(collection: &'static str, id: Uuid) -> Self {
        Self { collection, id }
    }
}

/// Result of a saga: distinguishes a failure before any write from a
/// failure that left known orphans behind.
#[derive(Debug)]
pub enum SagaOutcome<T> {
    /// Every forward step completed.
    Committed(T),
    /// Failed after some child writes landed; nothing was rolled back.
    PartiallyCommitted {
        /// Why the saga stopped.
        error: DomainError,
        /// Child documents written (or possibly written) before the failure.
        orphans: Vec<Orphan>,
    },
    /// Failed before any write.
    Aborted(DomainError),
}

impl<T> SagaOutcome<T> {
    /// Classifies a failure by whether anything was written.
    #[must_use]
    pub fn failed(error: DomainError, orphans: Vec<Orphan>) -> Self {
        if orphans.is_empty() {
            Self::Aborted(error)
        } else {
            Self::PartiallyCommitted { error, orphans }
        }
    }

    /// Orphans left behind, empty unless partially committed.
    #[must_use]
    pub fn orphans(&self) -> &[Orphan] {
        match self {
            Self::PartiallyCommitted { orphans, .. } => orphans,
            Self::Committed(_) | Self::Aborted(_) => &[],
        }
    }

    /// Collapses the outcome into the caller-facing result.
    ///
    /// # Errors
    ///
    /// Returns the saga's error unless it committed.
    pub fn into_result(self) -> Result<T, DomainError> {
        match self {
            Self::Committed(value) => Ok(value),
            Self::PartiallyCommitted { error, .. } | Self::Aborted(error) => Err(error),
        }
    }
}

/// Result of one independent step of a cascading delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The step removed `count` documents.
    Deleted {
        /// Number of documents removed.
        count: u64,
    },
    /// Nothing matched.
    NotFound,
    /// The step errored or timed out.
    Failed {
        /// Failure description.
        reason: String,
    },
}

impl StepOutcome {
    /// Whether the step failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Per-collection results of deleting a resume. The three steps are
/// independent: one failing does not block or undo the others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    /// Deleting the resume document.
    pub resume: StepOutcome,
    /// Deleting every work-history entry of the owner.
    pub work_history: StepOutcome,
    /// Deleting every reference of the owner.
    pub references: StepOutcome,
}

impl DeleteOutcome {
    /// Whether any step failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.resume.is_failed() || self.work_history.is_failed() || self.references.is_failed()
    }
}
