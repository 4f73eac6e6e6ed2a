//! Fault-injecting collections for exercising partial-failure paths.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use uuid::Uuid;
use vitae_core::document::{Document, Versioned};
use vitae_core::error::DomainError;
use vitae_core::repository::{AggregateCollection, ChildCollection};

use crate::collections::{InMemoryAggregateCollection, InMemoryChildCollection};

fn connection_refused() -> DomainError {
    DomainError::Infrastructure("connection refused".into())
}

/// A child collection that fails every call with an infrastructure error.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingChildCollection;

#[async_trait]
impl<T: Document> ChildCollection<T> for FailingChildCollection {
    async fn insert_one(&self, _document: &T) -> Result<Uuid, DomainError> {
        Err(connection_refused())
    }

    async fn insert_many(&self, _documents: &[T]) -> Result<Vec<Uuid>, DomainError> {
        Err(connection_refused())
    }

    async fn find_by_id(&self, _id: Uuid) -> Result<Option<T>, DomainError> {
        Err(connection_refused())
    }

    async fn delete_by_id(&self, _id: Uuid) -> Result<bool, DomainError> {
        Err(connection_refused())
    }

    async fn delete_many(&self, _owner_id: &str) -> Result<u64, DomainError> {
        Err(connection_refused())
    }
}

/// An aggregate collection that fails every call with an infrastructure error.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingAggregateCollection;

#[async_trait]
impl<T: Document> AggregateCollection<T> for FailingAggregateCollection {
    async fn insert(&self, _document: &T) -> Result<(), DomainError> {
        Err(connection_refused())
    }

    async fn find_by_owner(&self, _owner_id: &str) -> Result<Option<Versioned<T>>, DomainError> {
        Err(connection_refused())
    }

    async fn replace(&self, _document: &T, _expected_version: i64) -> Result<i64, DomainError> {
        Err(connection_refused())
    }

    async fn delete_by_id(&self, _id: Uuid) -> Result<bool, DomainError> {
        Err(connection_refused())
    }
}

/// A child collection whose calls never complete. Used to drive fan-out
/// deadlines.
#[derive(Debug, Default, Clone, Copy)]
pub struct StalledChildCollection;

#[async_trait]
impl<T: Document> ChildCollection<T> for StalledChildCollection {
    async fn insert_one(&self, _document: &T) -> Result<Uuid, DomainError> {
        std::future::pending().await
    }

    async fn insert_many(&self, _documents: &[T]) -> Result<Vec<Uuid>, DomainError> {
        std::future::pending().await
    }

    async fn find_by_id(&self, _id: Uuid) -> Result<Option<T>, DomainError> {
        std::future::pending().await
    }

    async fn delete_by_id(&self, _id: Uuid) -> Result<bool, DomainError> {
        std::future::pending().await
    }

    async fn delete_many(&self, _owner_id: &str) -> Result<u64, DomainError> {
        std::future::pending().await
    }
}

/// Which operations a `FaultyChildCollection` should fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct Faults {
    /// Fail `insert_one` and `insert_many`.
    pub inserts: bool,
    /// Fail `find_by_id`.
    pub finds: bool,
    /// Fail `delete_by_id` and `delete_many`.
    pub deletes: bool,
}

/// A working in-memory child collection with selected operations failing.
#[derive(Debug)]
pub struct FaultyChildCollection<T> {
    inner: InMemoryChildCollection<T>,
    faults: Faults,
}

impl<T: Document> FaultyChildCollection<T> {
    /// Wraps an empty in-memory collection.
    #[must_use]
    pub fn new(faults: Faults) -> Self {
        Self {
            inner: InMemoryChildCollection::new(),
            faults,
        }
    }

    /// The wrapped collection, for seeding and assertions.
    pub fn inner(&self) -> &InMemoryChildCollection<T> {
        &self.inner
    }
}

#[async_trait]
impl<T: Document> ChildCollection<T> for FaultyChildCollection<T> {
    async fn insert_one(&self, document: &T) -> Result<Uuid, DomainError> {
        if self.faults.inserts {
            return Err(connection_refused());
        }
        self.inner.insert_one(document).await
    }

    async fn insert_many(&self, documents: &[T]) -> Result<Vec<Uuid>, DomainError> {
        if self.faults.inserts {
            return Err(connection_refused());
        }
        self.inner.insert_many(documents).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<T>, DomainError> {
        if self.faults.finds {
            return Err(connection_refused());
        }
        self.inner.find_by_id(id).await
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, DomainError> {
        if self.faults.deletes {
            return Err(connection_refused());
        }
        self.inner.delete_by_id(id).await
    }

    async fn delete_many(&self, owner_id: &str) -> Result<u64, DomainError> {
        if self.faults.deletes {
            return Err(connection_refused());
        }
        self.inner.delete_many(owner_id).await
    }
}

type RivalWrite<T> = Box<dyn Fn(&T) -> T + Send + Sync>;

/// A working in-memory aggregate collection where another writer slips in
/// ahead of the next `contended` calls to `replace`.
///
/// Each contended `replace` first stores `rival(current)` under the current
/// version, then forwards the caller's write, which therefore hits a real
/// version conflict.
pub struct ContendedAggregateCollection<T> {
    inner: InMemoryAggregateCollection<T>,
    contended: AtomicUsize,
    rival: RivalWrite<T>,
}

impl<T: Document> ContendedAggregateCollection<T> {
    /// Wraps an empty in-memory collection.
    #[must_use]
    pub fn new(contended: usize, rival: impl Fn(&T) -> T + Send + Sync + 'static) -> Self {
        Self {
            inner: InMemoryAggregateCollection::new(),
            contended: AtomicUsize::new(contended),
            rival: Box::new(rival),
        }
    }

    /// The wrapped collection, for assertions.
    pub fn inner(&self) -> &InMemoryAggregateCollection<T> {
        &self.inner
    }

    /// Contended writes not yet spent.
    pub fn contended_remaining(&self) -> usize {
        self.contended.load(Ordering::SeqCst)
    }
}

impl<T> fmt::Debug for ContendedAggregateCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContendedAggregateCollection")
            .field("contended", &self.contended)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T: Document> AggregateCollection<T> for ContendedAggregateCollection<T> {
    async fn insert(&self, document: &T) -> Result<(), DomainError> {
        self.inner.insert(document).await
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Option<Versioned<T>>, DomainError> {
        self.inner.find_by_owner(owner_id).await
    }

    async fn replace(&self, document: &T, expected_version: i64) -> Result<i64, DomainError> {
        let contended = self
            .contended
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if contended {
            if let Some(current) = self.inner.find_by_owner(document.owner_id()).await? {
                let rival = (self.rival)(&current.document);
                self.inner.replace(&rival, current.version).await?;
            }
        }
        self.inner.replace(document, expected_version).await
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, DomainError> {
        self.inner.delete_by_id(id).await
    }
}
