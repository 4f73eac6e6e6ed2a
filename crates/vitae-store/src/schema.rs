//! Document table layout and the SQL issued against it.
//!
//! Every collection is a table named after `Document::COLLECTION` holding
//! the serialized document in `doc` next to the columns the store filters
//! on. Table names come from compile-time constants, never from input.

/// Tables the migrations create, in creation order.
pub const DOCUMENT_TABLES: [&str; 3] = ["resumes", "work_histories", "resume_references"];

/// Bind parameters per child row: `id`, `owner_id`, `doc`.
const CHILD_ROW_BINDS: usize = 3;

/// Rows per child `INSERT`, keeping a statement within the protocol's
/// 65,535 bind parameters.
pub const MAX_CHILD_ROWS_PER_STATEMENT: usize = 65_535 / CHILD_ROW_BINDS;

/// `INSERT` prefix for child rows; values are appended per batch.
pub(crate) fn insert_child(table: &str) -> String {
    format!("INSERT INTO {table} (id, owner_id, doc) ")
}

pub(crate) fn select_doc_by_id(table: &str) -> String {
    format!("SELECT doc FROM {table} WHERE id = $1")
}

pub(crate) fn delete_by_id(table: &str) -> String {
    format!("DELETE FROM {table} WHERE id = $1")
}

pub(crate) fn delete_by_owner(table: &str) -> String {
    format!("DELETE FROM {table} WHERE owner_id = $1")
}

pub(crate) fn insert_aggregate(table: &str) -> String {
    format!("INSERT INTO {table} (id, owner_id, doc, version) VALUES ($1, $2, $3, 1)")
}

pub(crate) fn select_versioned_by_owner(table: &str) -> String {
    format!("SELECT doc, version FROM {table} WHERE owner_id = $1")
}

pub(crate) fn select_version_by_id(table: &str) -> String {
    format!("SELECT version FROM {table} WHERE id = $1")
}

/// Compare-and-swap on `version`; returns the new version when it matched.
pub(crate) fn replace_if_version(table: &str) -> String {
    format!(
        "UPDATE {table} SET doc = $2, version = version + 1, updated_at = NOW() \
         WHERE id = $1 AND version = $3 RETURNING version"
    )
}
