//! Documents of the resume context and their input shapes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vitae_core::document::Document;
use vitae_core::error::DomainError;

/// The aggregate root. Children are referenced by id, never embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resume {
    /// Aggregate identifier, immutable.
    pub id: Uuid,
    /// The owning user; at most one resume per owner.
    pub owner_id: String,
    /// Optional free text.
    pub cover_letter: Option<String>,
    /// Work-history document ids in display order.
    pub work_history_ids: Vec<Uuid>,
    /// Reference document ids in display order.
    pub reference_ids: Vec<Uuid>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Refreshed on every mutation of this document.
    pub updated_at: DateTime<Utc>,
}

impl Resume {
    /// Builds a freshly created resume.
    #[must_use]
    pub fn new(
        id: Uuid,
        owner_id: String,
        cover_letter: Option<String>,
        work_history_ids: Vec<Uuid>,
        reference_ids: Vec<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            cover_letter,
            work_history_ids,
            reference_ids,
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends a reference id unless it is already listed.
    /// Returns whether the document changed.
    pub fn append_reference(&mut self, reference_id: Uuid, now: DateTime<Utc>) -> bool {
        if self.reference_ids.contains(&reference_id) {
            return false;
        }
        self.reference_ids.push(reference_id);
        self.updated_at = now;
        true
    }

    /// Removes a reference id, keeping the order of the others.
    /// Returns whether the document changed.
    pub fn remove_reference(&mut self, reference_id: Uuid, now: DateTime<Utc>) -> bool {
        let before = self.reference_ids.len();
        self.reference_ids.retain(|id| *id != reference_id);
        if self.reference_ids.len() == before {
            return false;
        }
        self.updated_at = now;
        true
    }

    /// Sets or clears the cover letter.
    pub fn set_cover_letter(&mut self, cover_letter: Option<String>, now: DateTime<Utc>) {
        self.cover_letter = cover_letter;
        self.updated_at = now;
    }
}

impl Document for Resume {
    const COLLECTION: &'static str = "resumes";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// A past or current position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkHistory {
    /// Document identifier.
    pub id: Uuid,
    /// The user this entry belongs to (not the resume).
    pub owner_id: String,
    /// Employer name.
    pub company_name: String,
    /// First day of work.
    pub started_work: NaiveDate,
    /// Last day of work; `None` for the current position.
    pub finished_work: Option<NaiveDate>,
    /// Optional description of the role.
    pub description: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Document for WorkHistory {
    const COLLECTION: &'static str = "work_histories";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// A professional reference contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    /// Document identifier.
    pub id: Uuid,
    /// The user this reference belongs to.
    pub owner_id: String,
    /// Contact's name.
    pub contact_name: String,
    /// Contact's phone number.
    pub contact_phone_no: Option<String>,
    /// Contact's email address.
    pub contact_email: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Document for Reference {
    const COLLECTION: &'static str = "resume_references";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// Caller-supplied work-history entry, before ids and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkHistory {
    /// Employer name.
    pub company_name: String,
    /// First day of work.
    pub started_work: NaiveDate,
    /// Last day of work.
    #[serde(default)]
    pub finished_work: Option<NaiveDate>,
    /// Role description.
    #[serde(default)]
    pub description: Option<String>,
}

impl NewWorkHistory {
    /// Checks required fields and date order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a blank company name or a
    /// finish date before the start date.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.company_name.trim().is_empty() {
            return Err(DomainError::Validation(
                "company_name must not be empty".into(),
            ));
        }
        if let Some(finished) = self.finished_work {
            if finished < self.started_work {
                return Err(DomainError::Validation(format!(
                    "finished_work {finished} precedes started_work {}",
                    self.started_work
                )));
            }
        }
        Ok(())
    }

    /// Stamps the entry into a storable document.
    #[must_use]
    pub fn to_document(&self, id: Uuid, owner_id: &str, now: DateTime<Utc>) -> WorkHistory {
        WorkHistory {
            id,
            owner_id: owner_id.to_owned(),
            company_name: self.company_name.clone(),
            started_work: self.started_work,
            finished_work: self.finished_work,
            description: self.description.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Caller-supplied reference, before ids and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReference {
    /// Contact's name.
    pub contact_name: String,
    /// Contact's phone number.
    #[serde(default)]
    pub contact_phone_no: Option<String>,
    /// Contact's email address.
    #[serde(default)]
    pub contact_email: Option<String>,
}

impl NewReference {
    /// Checks required fields.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a blank contact name.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.contact_name.trim().is_empty() {
            return Err(DomainError::Validation(
                "contact_name must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Stamps the reference into a storable document.
    #[must_use]
    pub fn to_document(&self, id: Uuid, owner_id: &str, now: DateTime<Utc>) -> Reference {
        Reference {
            id,
            owner_id: owner_id.to_owned(),
            contact_name: self.contact_name.clone(),
            contact_phone_no: self.contact_phone_no.clone(),
            contact_email: self.contact_email.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A resume with its children materialized in stored order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumeView {
    /// Aggregate identifier.
    pub id: Uuid,
    /// The owning user.
    pub owner_id: String,
    /// Optional free text.
    pub cover_letter: Option<String>,
    /// Work-history documents, in `work_history_ids` order.
    pub work_history: Vec<WorkHistory>,
    /// Reference documents, in `reference_ids` order.
    pub references: Vec<Reference>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time of the resume document.
    pub updated_at: DateTime<Utc>,
}

impl ResumeView {
    /// Combines a resume with its fetched children.
    #[must_use]
    pub fn assemble(resume: Resume, work_history: Vec<WorkHistory>, references: Vec<Reference>) -> Self {
        Self {
            id: resume.id,
            owner_id: resume.owner_id,
            cover_letter: resume.cover_letter,
            work_history,
            references,
            created_at: resume.created_at,
            updated_at: resume.updated_at,
        }
    }
}
