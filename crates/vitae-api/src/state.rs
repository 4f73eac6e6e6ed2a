//! Shared application state.

use std::sync::Arc;

use sqlx::PgPool;
use vitae_core::clock::{Clock, SystemClock};
use vitae_resume::application::collections::ResumeCollections;
use vitae_resume::application::fanout::FanOutPolicy;
use vitae_resume::domain::documents::{Reference, Resume, WorkHistory};
use vitae_store::pg_collection::{PgAggregateCollection, PgChildCollection};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Clock used to stamp documents.
    pub clock: Arc<dyn Clock>,
    /// The resume collection and its child collections.
    pub collections: ResumeCollections,
    /// Limits applied to every child fan-out.
    pub fan_out: FanOutPolicy,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, collections: ResumeCollections, fan_out: FanOutPolicy) -> Self {
        Self {
            clock,
            collections,
            fan_out,
        }
    }

    /// State backed by the `PostgreSQL` collections and the system clock.
    #[must_use]
    pub fn postgres(pool: &PgPool, fan_out: FanOutPolicy) -> Self {
        let collections = ResumeCollections::new(
            Arc::new(PgAggregateCollection::<Resume>::new(pool.clone())),
            Arc::new(PgChildCollection::<WorkHistory>::new(pool.clone())),
            Arc::new(PgChildCollection::<Reference>::new(pool.clone())),
        );
        Self::new(Arc::new(SystemClock), collections, fan_out)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("collections", &self.collections)
            .field("fan_out", &self.fan_out)
            .finish_non_exhaustive()
    }
}
