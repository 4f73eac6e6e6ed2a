//! Commands for the resume context.

use uuid::Uuid;
use vitae_core::command::Command;

use super::documents::{NewReference, NewWorkHistory};

/// Command to create a resume together with its initial children.
#[derive(Debug, Clone)]
pub struct CreateResume {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The owning user.
    pub owner_id: String,
    /// Optional cover letter.
    pub cover_letter: Option<String>,
    /// Work-history entries; `None` skips the batch entirely.
    pub work_history: Option<Vec<NewWorkHistory>>,
    /// References; `None` skips the batch entirely.
    pub references: Option<Vec<NewReference>>,
}

impl Command for CreateResume {
    fn command_type(&self) -> &'static str {
        "resume.create"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// Command to add one reference to an existing resume.
#[derive(Debug, Clone)]
pub struct AddReference {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The owning user.
    pub owner_id: String,
    /// The reference to add.
    pub reference: NewReference,
    /// Caller-chosen id that makes retries land on the same document.
    ///
    /// A stored document with this id and owner counts as the earlier
    /// insert, so replaying the command links it again. That includes a
    /// document a `RemoveReference` unlinked but failed to delete; keys
    /// must not be reused once the reference has been removed.
    pub idempotency_key: Option<Uuid>,
}

impl Command for AddReference {
    fn command_type(&self) -> &'static str {
        "resume.add_reference"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// Command to remove one reference from a resume.
#[derive(Debug, Clone)]
pub struct RemoveReference {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The owning user.
    pub owner_id: String,
    /// The reference to remove.
    pub reference_id: Uuid,
}

impl Command for RemoveReference {
    fn command_type(&self) -> &'static str {
        "resume.remove_reference"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// Command to set or clear the cover letter.
#[derive(Debug, Clone)]
pub struct UpdateCoverLetter {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The owning user.
    pub owner_id: String,
    /// New cover letter; `None` clears it.
    pub cover_letter: Option<String>,
}

impl Command for UpdateCoverLetter {
    fn command_type(&self) -> &'static str {
        "resume.update_cover_letter"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// Command to delete a resume and every child tagged with its owner.
#[derive(Debug, Clone)]
pub struct DeleteResume {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The owning user.
    pub owner_id: String,
}

impl Command for DeleteResume {
    fn command_type(&self) -> &'static str {
        "resume.delete"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}
