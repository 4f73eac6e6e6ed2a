//! `PostgreSQL` document collections.

pub mod pg_collection;
pub mod schema;
