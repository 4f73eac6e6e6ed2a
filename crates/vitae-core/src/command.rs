//! Command abstractions.

use uuid::Uuid;

/// Trait that all coordinator commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid;

    /// The user that owns the aggregate this command targets.
    fn owner_id(&self) -> &str;
}

/// Rejects blank owner identifiers.
///
/// # Errors
///
/// Returns `DomainError::Validation` if `owner_id` is empty or whitespace.
pub fn require_owner(owner_id: &str) -> Result<(), crate::error::DomainError> {
    if owner_id.trim().is_empty() {
        return Err(crate::error::DomainError::Validation(
            "owner_id must not be empty".into(),
        ));
    }
    Ok(())
}
