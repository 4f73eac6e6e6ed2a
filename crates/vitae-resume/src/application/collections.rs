//! The set of collections the coordinator orchestrates.

use std::sync::Arc;

use vitae_core::repository::{AggregateCollection, ChildCollection};

use crate::domain::documents::{Reference, Resume, WorkHistory};

/// Store handles injected into every handler.
#[derive(Clone)]
pub struct ResumeCollections {
    /// Resume aggregates.
    pub resumes: Arc<dyn AggregateCollection<Resume>>,
    /// Work-history children.
    pub work_history: Arc<dyn ChildCollection<WorkHistory>>,
    /// Reference children.
    pub references: Arc<dyn ChildCollection<Reference>>,
}

impl ResumeCollections {
    /// Bundles the three collections.
    #[must_use]
    pub fn new(
        resumes: Arc<dyn AggregateCollection<Resume>>,
        work_history: Arc<dyn ChildCollection<WorkHistory>>,
        references: Arc<dyn ChildCollection<Reference>>,
    ) -> Self {
        Self {
            resumes,
            work_history,
            references,
        }
    }
}

impl std::fmt::Debug for ResumeCollections {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumeCollections").finish_non_exhaustive()
    }
}
