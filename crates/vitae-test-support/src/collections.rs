//! In-memory `ChildCollection` and `AggregateCollection` implementations
//! backed by a mutex.
//!
//! Each call takes the lock once, so every operation is atomic the way a
//! single document update is atomic in the real store.

use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;
use vitae_core::document::{Document, Versioned};
use vitae_core::error::DomainError;
use vitae_core::repository::{AggregateCollection, ChildCollection};

/// A child collection that keeps documents in insertion order.
#[derive(Debug)]
pub struct InMemoryChildCollection<T> {
    documents: Mutex<Vec<T>>,
}

impl<T> Default for InMemoryChildCollection<T> {
    fn default() -> Self {
        Self {
            documents: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Document> InMemoryChildCollection<T> {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every stored document.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn documents(&self) -> Vec<T> {
        self.documents.lock().unwrap().clone()
    }

    /// Number of stored documents.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn len(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<T: Document> ChildCollection<T> for InMemoryChildCollection<T> {
    async fn insert_one(&self, document: &T) -> Result<Uuid, DomainError> {
        let mut documents = self.documents.lock().unwrap();
        if documents.iter().any(|d| d.id() == document.id()) {
            return Err(DomainError::AlreadyExists(format!(
                "{} document {}",
                T::COLLECTION,
                document.id()
            )));
        }
        documents.push(document.clone());
        Ok(document.id())
    }

    async fn insert_many(&self, batch: &[T]) -> Result<Vec<Uuid>, DomainError> {
        let mut documents = self.documents.lock().unwrap();
        if let Some(dup) = batch
            .iter()
            .find(|new| documents.iter().any(|d| d.id() == new.id()))
        {
            return Err(DomainError::AlreadyExists(format!(
                "{} document {}",
                T::COLLECTION,
                dup.id()
            )));
        }
        documents.extend(batch.iter().cloned());
        Ok(batch.iter().map(Document::id).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<T>, DomainError> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id() == id)
            .cloned())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, DomainError> {
        let mut documents = self.documents.lock().unwrap();
        let before = documents.len();
        documents.retain(|d| d.id() != id);
        Ok(documents.len() != before)
    }

    async fn delete_many(&self, owner_id: &str) -> Result<u64, DomainError> {
        let mut documents = self.documents.lock().unwrap();
        let before = documents.len();
        documents.retain(|d| d.owner_id() != owner_id);
        Ok((before - documents.len()) as u64)
    }
}

/// An aggregate collection enforcing one document per owner atomically.
#[derive(Debug)]
pub struct InMemoryAggregateCollection<T> {
    documents: Mutex<Vec<Versioned<T>>>,
}

impl<T> Default for InMemoryAggregateCollection<T> {
    fn default() -> Self {
        Self {
            documents: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Document> InMemoryAggregateCollection<T> {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every stored aggregate with its version.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn documents(&self) -> Vec<Versioned<T>> {
        self.documents.lock().unwrap().clone()
    }

    /// Number of stored aggregates.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn len(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<T: Document> AggregateCollection<T> for InMemoryAggregateCollection<T> {
    async fn insert(&self, document: &T) -> Result<(), DomainError> {
        let mut documents = self.documents.lock().unwrap();
        if documents.iter().any(|v| {
            v.document.id() == document.id() || v.document.owner_id() == document.owner_id()
        }) {
            return Err(DomainError::AlreadyExists(format!(
                "{} for owner {}",
                T::COLLECTION,
                document.owner_id()
            )));
        }
        documents.push(Versioned::new(document.clone(), 1));
        Ok(())
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Option<Versioned<T>>, DomainError> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .find(|v| v.document.owner_id() == owner_id)
            .cloned())
    }

    async fn replace(&self, document: &T, expected_version: i64) -> Result<i64, DomainError> {
        let mut documents = self.documents.lock().unwrap();
        let Some(stored) = documents
            .iter_mut()
            .find(|v| v.document.id() == document.id())
        else {
            return Err(DomainError::NotFound(format!(
                "{} {}",
                T::COLLECTION,
                document.id()
            )));
        };
        if stored.version != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: document.id(),
                expected: expected_version,
                actual: stored.version,
            });
        }
        stored.document = document.clone();
        stored.version += 1;
        Ok(stored.version)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, DomainError> {
        let mut documents = self.documents.lock().unwrap();
        let before = documents.len();
        documents.retain(|v| v.document.id() != id);
        Ok(documents.len() != before)
    }
}
