//! `PostgreSQL` implementations of the `ChildCollection` and
//! `AggregateCollection` traits.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use vitae_core::document::{Document, Versioned};
use vitae_core::error::DomainError;
use vitae_core::repository::{AggregateCollection, ChildCollection};

use crate::schema;

fn store_error<T: Document>(err: sqlx::Error) -> DomainError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DomainError::AlreadyExists(format!("{}: {}", T::COLLECTION, db.message()))
        }
        _ => DomainError::Infrastructure(format!("{}: {err}", T::COLLECTION)),
    }
}

fn encode<T: Document>(document: &T) -> Result<Value, DomainError> {
    serde_json::to_value(document).map_err(|e| {
        DomainError::Infrastructure(format!("{} encode failed: {e}", T::COLLECTION))
    })
}

fn decode<T: Document>(value: Value) -> Result<T, DomainError> {
    serde_json::from_value(value).map_err(|e| {
        DomainError::Infrastructure(format!("{} decode failed: {e}", T::COLLECTION))
    })
}

/// PostgreSQL-backed child collection stored in the `T::COLLECTION` table.
#[derive(Debug, Clone)]
pub struct PgChildCollection<T> {
    pool: PgPool,
    _document: PhantomData<fn() -> T>,
}

impl<T: Document> PgChildCollection<T> {
    /// Creates a new `PgChildCollection`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _document: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Document> ChildCollection<T> for PgChildCollection<T> {
    async fn insert_one(&self, document: &T) -> Result<Uuid, DomainError> {
        let ids = self.insert_many(std::slice::from_ref(document)).await?;
        Ok(ids.into_iter().next().unwrap_or_else(|| document.id()))
    }

    async fn insert_many(&self, documents: &[T]) -> Result<Vec<Uuid>, DomainError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let rows = documents
            .iter()
            .map(|d| encode(d).map(|doc| (d.id(), d.owner_id().to_owned(), doc)))
            .collect::<Result<Vec<_>, DomainError>>()?;

        // One transaction: the batch lands entirely or not at all, however
        // many statements it takes.
        let mut tx = self.pool.begin().await.map_err(store_error::<T>)?;
        let mut rows = rows.into_iter().peekable();
        let mut statements = 0_usize;
        while rows.peek().is_some() {
            let mut builder: QueryBuilder<'_, Postgres> =
                QueryBuilder::new(schema::insert_child(T::COLLECTION));
            builder.push_values(
                rows.by_ref().take(schema::MAX_CHILD_ROWS_PER_STATEMENT),
                |mut row, (id, owner_id, doc)| {
                    row.push_bind(id).push_bind(owner_id).push_bind(doc);
                },
            );
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(store_error::<T>)?;
            statements += 1;
        }
        tx.commit().await.map_err(store_error::<T>)?;

        debug!(
            collection = T::COLLECTION,
            count = documents.len(),
            statements,
            "documents inserted"
        );
        Ok(documents.iter().map(Document::id).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<T>, DomainError> {
        let row: Option<(Value,)> = sqlx::query_as(&schema::select_doc_by_id(T::COLLECTION))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error::<T>)?;
        row.map(|(doc,)| decode(doc)).transpose()
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, DomainError> {
        let result = sqlx::query(&schema::delete_by_id(T::COLLECTION))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error::<T>)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(&self, owner_id: &str) -> Result<u64, DomainError> {
        let result = sqlx::query(&schema::delete_by_owner(T::COLLECTION))
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(store_error::<T>)?;
        Ok(result.rows_affected())
    }
}

/// PostgreSQL-backed aggregate collection. The table carries a unique index
/// on `owner_id`, which is what makes one-aggregate-per-owner hold under
/// concurrent inserts.
#[derive(Debug, Clone)]
pub struct PgAggregateCollection<T> {
    pool: PgPool,
    _document: PhantomData<fn() -> T>,
}

impl<T: Document> PgAggregateCollection<T> {
    /// Creates a new `PgAggregateCollection`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _document: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Document> AggregateCollection<T> for PgAggregateCollection<T> {
    async fn insert(&self, document: &T) -> Result<(), DomainError> {
        let doc = encode(document)?;
        sqlx::query(&schema::insert_aggregate(T::COLLECTION))
            .bind(document.id())
            .bind(document.owner_id())
            .bind(doc)
            .execute(&self.pool)
            .await
            .map_err(store_error::<T>)?;
        Ok(())
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Option<Versioned<T>>, DomainError> {
        let row: Option<(Value, i64)> =
            sqlx::query_as(&schema::select_versioned_by_owner(T::COLLECTION))
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error::<T>)?;
        match row {
            Some((doc, version)) => Ok(Some(Versioned::new(decode(doc)?, version))),
            None => Ok(None),
        }
    }

    async fn replace(&self, document: &T, expected_version: i64) -> Result<i64, DomainError> {
        let doc = encode(document)?;
        let updated: Option<i64> = sqlx::query_scalar(&schema::replace_if_version(T::COLLECTION))
            .bind(document.id())
            .bind(doc)
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error::<T>)?;
        if let Some(version) = updated {
            return Ok(version);
        }

        let actual: Option<i64> = sqlx::query_scalar(&schema::select_version_by_id(T::COLLECTION))
            .bind(document.id())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error::<T>)?;
        match actual {
            Some(actual) => Err(DomainError::ConcurrencyConflict {
                aggregate_id: document.id(),
                expected: expected_version,
                actual,
            }),
            None => Err(DomainError::NotFound(format!(
                "{} {}",
                T::COLLECTION,
                document.id()
            ))),
        }
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, DomainError> {
        let result = sqlx::query(&schema::delete_by_id(T::COLLECTION))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error::<T>)?;
        Ok(result.rows_affected() > 0)
    }
}
