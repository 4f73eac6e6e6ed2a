//! Store contracts consumed by the aggregate coordinator.
//!
//! The backing database is assumed to offer by-id lookup, single-document
//! atomic update and equality filters only. Nothing here spans more than
//! one document atomically except `insert_many`, and callers must not rely
//! on that either.

use async_trait::async_trait;
use uuid::Uuid;

use crate::document::{Document, Versioned};
use crate::error::DomainError;

/// A collection of child documents owned (logically) by an aggregate.
#[async_trait]
pub trait ChildCollection<T: Document>: Send + Sync {
    /// Inserts one document and returns its id.
    ///
    /// Fails with `DomainError::AlreadyExists` if the id is taken.
    async fn insert_one(&self, document: &T) -> Result<Uuid, DomainError>;

    /// Inserts a batch and returns the ids in input order.
    async fn insert_many(&self, documents: &[T]) -> Result<Vec<Uuid>, DomainError>;

    /// Looks a document up by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<T>, DomainError>;

    /// Deletes a document by id. Returns `true` if a document was removed.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, DomainError>;

    /// Deletes every document tagged with `owner_id`. Returns the count.
    async fn delete_many(&self, owner_id: &str) -> Result<u64, DomainError>;
}

/// A collection of aggregate roots, at most one per owner.
#[async_trait]
pub trait AggregateCollection<T: Document>: Send + Sync {
    /// Inserts a new aggregate at version 1.
    ///
    /// Fails with `DomainError::AlreadyExists` if the id or the owner is
    /// already taken. The owner check is atomic with the insert.
    async fn insert(&self, document: &T) -> Result<(), DomainError>;

    /// Finds the aggregate for `owner_id`.
    async fn find_by_owner(&self, owner_id: &str) -> Result<Option<Versioned<T>>, DomainError>;

    /// Replaces the aggregate if it is still at `expected_version` and
    /// returns the new version.
    ///
    /// Fails with `DomainError::ConcurrencyConflict` on a version mismatch and
    /// `DomainError::NotFound` if the aggregate is gone.
    async fn replace(&self, document: &T, expected_version: i64) -> Result<i64, DomainError>;

    /// Deletes an aggregate by id. Returns `true` if a document was removed.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, DomainError>;
}
