//! Document abstraction for schemaless collections.

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// A document stored in a named collection, keyed by an opaque id and
/// tagged with the user that owns it.
///
/// Stores persist the serialized body as-is; `id` and `owner_id` are also
/// lifted out so collections can look documents up and filter by owner.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection (table) name.
    const COLLECTION: &'static str;

    /// The document identifier.
    fn id(&self) -> Uuid;

    /// The owning user.
    fn owner_id(&self) -> &str;
}

/// A document together with the store-managed version used for
/// compare-and-swap updates.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    /// The document body.
    pub document: T,
    /// Version at the time of reading. Starts at 1 on insert.
    pub version: i64,
}

impl<T> Versioned<T> {
    /// Wraps a document read at `version`.
    #[must_use]
    pub fn new(document: T, version: i64) -> Self {
        Self { document, version }
    }
}
