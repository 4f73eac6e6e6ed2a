//! Command handlers for the resume context.
//!
//! Each handler orchestrates calls across the resume collection and the two
//! child collections. None of the sequences are atomic; the ordering of the
//! steps is chosen so that a crash part-way leaves at worst an orphan child,
//! never a resume pointing at a missing child.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use vitae_core::clock::Clock;
use vitae_core::command::{Command, require_owner};
use vitae_core::document::{Document, Versioned};
use vitae_core::error::DomainError;
use vitae_core::repository::{AggregateCollection, ChildCollection};

use crate::application::collections::ResumeCollections;
use crate::application::fanout::{FanOutError, FanOutPolicy, within_deadline};
use crate::domain::commands::{
    AddReference, CreateResume, DeleteResume, RemoveReference, UpdateCoverLetter,
};
use crate::domain::documents::{Reference, Resume, WorkHistory};
use crate::domain::saga::{DeleteOutcome, Orphan, SagaOutcome, StepOutcome};

/// Attempts at a read-modify-write before a version conflict is surfaced.
const MAX_WRITE_ATTEMPTS: usize = 3;

fn validate_create(command: &CreateResume) -> Result<(), DomainError> {
    require_owner(command.owner_id())?;
    for entry in command.work_history.iter().flatten() {
        entry.validate()?;
    }
    for reference in command.references.iter().flatten() {
        reference.validate()?;
    }
    Ok(())
}

fn child_write_error(collection: &'static str, err: &FanOutError) -> DomainError {
    match err {
        FanOutError::Failed { source, .. } => {
            DomainError::child_write_failed(collection, source.to_string())
        }
        FanOutError::DeadlineElapsed(_) => DomainError::child_write_failed(collection, err.to_string()),
    }
}

/// Inserts one child batch, if any. Returns the stored ids, or the error
/// together with the ids that may have landed anyway (on timeout).
async fn insert_batch<T: Document>(
    collection: &dyn ChildCollection<T>,
    documents: Option<&[T]>,
    deadline: Duration,
) -> Result<Vec<Uuid>, (DomainError, Vec<Uuid>)> {
    let Some(documents) = documents else {
        return Ok(Vec::new());
    };
    match within_deadline(deadline, collection.insert_many(documents)).await {
        Ok(ids) => Ok(ids),
        Err(err @ FanOutError::DeadlineElapsed(_)) => Err((
            child_write_error(T::COLLECTION, &err),
            documents.iter().map(Document::id).collect(),
        )),
        Err(err) => Err((child_write_error(T::COLLECTION, &err), Vec::new())),
    }
}

/// Runs the create saga and reports exactly which child documents were left
/// behind if it fails part-way.
///
/// Steps: reject an existing resume; insert the work-history and reference
/// batches concurrently; insert the resume referencing the returned ids.
/// The resume insert is the only point at which the aggregate becomes
/// visible, and the store refuses a second resume for the same owner.
pub async fn run_create_resume_saga(
    command: &CreateResume,
    clock: &dyn Clock,
    collections: &ResumeCollections,
    policy: FanOutPolicy,
) -> SagaOutcome<Resume> {
    if let Err(err) = validate_create(command) {
        return SagaOutcome::Aborted(err);
    }
    let owner_id = command.owner_id();

    match collections.resumes.find_by_owner(owner_id).await {
        Ok(Some(_)) => {
            return SagaOutcome::Aborted(DomainError::AlreadyExists(format!(
                "resume for owner {owner_id}"
            )));
        }
        Ok(None) => {}
        Err(err) => return SagaOutcome::Aborted(err),
    }

    let now = clock.now();
    let work_history: Option<Vec<WorkHistory>> = command.work_history.as_ref().map(|entries| {
        entries
            .iter()
            .map(|entry| entry.to_document(Uuid::new_v4(), owner_id, now))
            .collect()
    });
    let references: Option<Vec<Reference>> = command.references.as_ref().map(|entries| {
        entries
            .iter()
            .map(|entry| entry.to_document(Uuid::new_v4(), owner_id, now))
            .collect()
    });

    let (work_history_result, reference_result) = tokio::join!(
        insert_batch(
            collections.work_history.as_ref(),
            work_history.as_deref(),
            policy.deadline
        ),
        insert_batch(
            collections.references.as_ref(),
            references.as_deref(),
            policy.deadline
        ),
    );

    let mut orphans = Vec::new();
    let mut failure = None;
    let work_history_ids = match work_history_result {
        Ok(ids) => {
            orphans.extend(ids.iter().map(|id| Orphan::new(WorkHistory::COLLECTION, *id)));
            ids
        }
        Err((err, maybe_written)) => {
            orphans.extend(
                maybe_written
                    .into_iter()
                    .map(|id| Orphan::new(WorkHistory::COLLECTION, id)),
            );
            failure = Some(err);
            Vec::new()
        }
    };
    let reference_ids = match reference_result {
        Ok(ids) => {
            orphans.extend(ids.iter().map(|id| Orphan::new(Reference::COLLECTION, *id)));
            ids
        }
        Err((err, maybe_written)) => {
            orphans.extend(
                maybe_written
                    .into_iter()
                    .map(|id| Orphan::new(Reference::COLLECTION, id)),
            );
            failure.get_or_insert(err);
            Vec::new()
        }
    };
    if let Some(err) = failure {
        return SagaOutcome::failed(err, orphans);
    }

    let resume = Resume::new(
        Uuid::new_v4(),
        owner_id.to_owned(),
        command.cover_letter.clone(),
        work_history_ids,
        reference_ids,
        now,
    );
    match collections.resumes.insert(&resume).await {
        Ok(()) => SagaOutcome::Committed(resume),
        Err(err) => SagaOutcome::failed(err, orphans),
    }
}

/// Handles the `CreateResume` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` for bad input,
/// `DomainError::AlreadyExists` if the owner already has a resume (no child
/// is written in that case unless a concurrent create won the race), and
/// `DomainError::ChildWriteFailed` if a child batch fails or times out.
#[instrument(skip_all, fields(owner_id = command.owner_id(), correlation_id = %command.correlation_id()))]
pub async fn handle_create_resume(
    command: &CreateResume,
    clock: &dyn Clock,
    collections: &ResumeCollections,
    policy: FanOutPolicy,
) -> Result<Resume, DomainError> {
    let outcome = run_create_resume_saga(command, clock, collections, policy).await;
    match &outcome {
        SagaOutcome::Committed(resume) => info!(
            command_type = command.command_type(),
            resume_id = %resume.id,
            work_history = resume.work_history_ids.len(),
            references = resume.reference_ids.len(),
            "resume created"
        ),
        SagaOutcome::PartiallyCommitted { error, orphans } => warn!(
            command_type = command.command_type(),
            error = %error,
            orphans = ?orphans,
            "resume creation failed after child writes; orphans left for reconciliation"
        ),
        SagaOutcome::Aborted(error) => debug!(
            command_type = command.command_type(),
            error = %error,
            "resume creation aborted"
        ),
    }
    outcome.into_result()
}

/// Optimistic read-modify-write of the owner's resume.
///
/// `mutate` returns whether it changed the document; unchanged documents are
/// not written back. Version conflicts are retried with a fresh read.
async fn modify_resume<F>(
    resumes: &dyn AggregateCollection<Resume>,
    owner_id: &str,
    mut mutate: F,
) -> Result<Resume, DomainError>
where
    F: FnMut(&mut Resume) -> bool + Send,
{
    let mut attempt = 1;
    loop {
        let Some(Versioned {
            document: mut resume,
            version,
        }) = resumes.find_by_owner(owner_id).await?
        else {
            return Err(DomainError::NotFound(format!("resume for owner {owner_id}")));
        };

        if !mutate(&mut resume) {
            return Ok(resume);
        }

        match resumes.replace(&resume, version).await {
            Ok(_) => return Ok(resume),
            Err(DomainError::ConcurrencyConflict { .. }) if attempt < MAX_WRITE_ATTEMPTS => {
                debug!(attempt, "resume version conflict; retrying");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Inserts the reference, treating a replay of the same idempotency key by
/// the same owner as already done.
async fn insert_reference(
    references: &dyn ChildCollection<Reference>,
    reference: &Reference,
    replayable: bool,
) -> Result<(), DomainError> {
    match references.insert_one(reference).await {
        Ok(_) => Ok(()),
        Err(DomainError::AlreadyExists(_)) if replayable => {
            let existing = references
                .find_by_id(reference.id)
                .await
                .map_err(|e| DomainError::child_write_failed(Reference::COLLECTION, e.to_string()))?;
            match existing {
                Some(existing) if existing.owner_id == reference.owner_id => {
                    debug!(reference_id = %reference.id, "reference already inserted; replaying");
                    Ok(())
                }
                _ => Err(DomainError::AlreadyExists(format!(
                    "reference {}",
                    reference.id
                ))),
            }
        }
        Err(err) => Err(DomainError::child_write_failed(
            Reference::COLLECTION,
            err.to_string(),
        )),
    }
}

/// Handles the `AddReference` command: inserts the reference, then appends
/// its id to the resume. Returns the updated reference id list.
///
/// A crash between the two steps leaves an orphan reference. Retrying with
/// the same `idempotency_key` completes the append instead of creating a
/// second document. The store keeps no record of removals, so a replay after
/// a remove whose document delete failed re-links that document.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the owner has no resume,
/// `DomainError::ChildWriteFailed` if the insert fails,
/// `DomainError::AlreadyExists` if the idempotency key names another
/// owner's reference, and `DomainError::ConcurrencyConflict` if the resume
/// keeps changing underneath.
#[instrument(skip_all, fields(owner_id = command.owner_id(), correlation_id = %command.correlation_id()))]
pub async fn handle_add_reference(
    command: &AddReference,
    clock: &dyn Clock,
    collections: &ResumeCollections,
) -> Result<Vec<Uuid>, DomainError> {
    let owner_id = command.owner_id();
    require_owner(owner_id)?;
    command.reference.validate()?;

    if collections.resumes.find_by_owner(owner_id).await?.is_none() {
        return Err(DomainError::NotFound(format!("resume for owner {owner_id}")));
    }

    let now = clock.now();
    let reference_id = command.idempotency_key.unwrap_or_else(Uuid::new_v4);
    let reference = command.reference.to_document(reference_id, owner_id, now);
    insert_reference(
        collections.references.as_ref(),
        &reference,
        command.idempotency_key.is_some(),
    )
    .await?;

    let resume = modify_resume(collections.resumes.as_ref(), owner_id, |resume| {
        resume.append_reference(reference_id, now)
    })
    .await
    .inspect_err(|err| {
        warn!(
            reference_id = %reference_id,
            error = %err,
            "reference inserted but not linked; orphan left for reconciliation"
        );
    })?;

    info!(
        command_type = command.command_type(),
        reference_id = %reference_id,
        "reference added"
    );
    Ok(resume.reference_ids)
}

/// Deletes the reference document if it belongs to `owner_id`.
/// Returns whether a document was removed.
async fn delete_owned_reference(
    references: &dyn ChildCollection<Reference>,
    owner_id: &str,
    reference_id: Uuid,
) -> Result<bool, DomainError> {
    match references.find_by_id(reference_id).await? {
        Some(reference) if reference.owner_id == owner_id => {
            references.delete_by_id(reference_id).await
        }
        _ => Ok(false),
    }
}

/// Handles the `RemoveReference` command: unlinks the id from the resume,
/// then deletes the document. Returns the updated reference id list.
///
/// Unlinking first means a crash between the steps leaves an orphan
/// document, never a dangling id. A retry after such a crash finds the id
/// already unlinked, deletes the leftover document and succeeds.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the owner has no resume or the
/// reference is neither listed nor stored for this owner.
#[instrument(skip_all, fields(owner_id = command.owner_id(), correlation_id = %command.correlation_id()))]
pub async fn handle_remove_reference(
    command: &RemoveReference,
    clock: &dyn Clock,
    collections: &ResumeCollections,
) -> Result<Vec<Uuid>, DomainError> {
    let owner_id = command.owner_id();
    require_owner(owner_id)?;
    let reference_id = command.reference_id;
    let now = clock.now();

    let mut was_listed = false;
    let resume = modify_resume(collections.resumes.as_ref(), owner_id, |resume| {
        let removed = resume.remove_reference(reference_id, now);
        was_listed |= removed;
        removed
    })
    .await?;

    match delete_owned_reference(collections.references.as_ref(), owner_id, reference_id).await {
        Ok(true) => {}
        Ok(false) if was_listed => {
            debug!(reference_id = %reference_id, "reference document already gone");
        }
        Ok(false) => {
            return Err(DomainError::NotFound(format!("reference {reference_id}")));
        }
        Err(err) if was_listed => {
            warn!(
                reference_id = %reference_id,
                error = %err,
                "reference unlinked but not deleted; orphan left for reconciliation"
            );
        }
        Err(err) => return Err(err),
    }

    info!(
        command_type = command.command_type(),
        reference_id = %reference_id,
        "reference removed"
    );
    Ok(resume.reference_ids)
}

/// Handles the `UpdateCoverLetter` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the owner has no resume and
/// `DomainError::ConcurrencyConflict` if the resume keeps changing
/// underneath.
#[instrument(skip_all, fields(owner_id = command.owner_id(), correlation_id = %command.correlation_id()))]
pub async fn handle_update_cover_letter(
    command: &UpdateCoverLetter,
    clock: &dyn Clock,
    collections: &ResumeCollections,
) -> Result<Resume, DomainError> {
    let owner_id = command.owner_id();
    require_owner(owner_id)?;
    let now = clock.now();

    let resume = modify_resume(collections.resumes.as_ref(), owner_id, |resume| {
        resume.set_cover_letter(command.cover_letter.clone(), now);
        true
    })
    .await?;

    info!(command_type = command.command_type(), "cover letter updated");
    Ok(resume)
}

async fn settle<Fut>(deadline: Duration, step: Fut) -> StepOutcome
where
    Fut: Future<Output = Result<u64, DomainError>>,
{
    match within_deadline(deadline, step).await {
        Ok(0) => StepOutcome::NotFound,
        Ok(count) => StepOutcome::Deleted { count },
        Err(FanOutError::Failed { source, .. }) => StepOutcome::Failed {
            reason: source.to_string(),
        },
        Err(err @ FanOutError::DeadlineElapsed(_)) => StepOutcome::Failed {
            reason: err.to_string(),
        },
    }
}

async fn delete_resume_document(
    resumes: &dyn AggregateCollection<Resume>,
    owner_id: &str,
) -> Result<u64, DomainError> {
    match resumes.find_by_owner(owner_id).await? {
        Some(found) => Ok(u64::from(resumes.delete_by_id(found.document.id).await?)),
        None => Ok(0),
    }
}

/// Handles the `DeleteResume` command: a best-effort cascading delete.
///
/// The resume and both child collections are deleted concurrently with no
/// ordering and no rollback. Each result is reported on its own.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a blank owner; store failures are
/// reported inside the returned `DeleteOutcome`, never as an error.
#[instrument(skip_all, fields(owner_id = command.owner_id(), correlation_id = %command.correlation_id()))]
pub async fn handle_delete_resume(
    command: &DeleteResume,
    collections: &ResumeCollections,
    policy: FanOutPolicy,
) -> Result<DeleteOutcome, DomainError> {
    let owner_id = command.owner_id();
    require_owner(owner_id)?;

    let (resume, work_history, references) = tokio::join!(
        settle(
            policy.deadline,
            delete_resume_document(collections.resumes.as_ref(), owner_id)
        ),
        settle(policy.deadline, collections.work_history.delete_many(owner_id)),
        settle(policy.deadline, collections.references.delete_many(owner_id)),
    );
    let outcome = DeleteOutcome {
        resume,
        work_history,
        references,
    };

    if outcome.has_failures() {
        warn!(
            command_type = command.command_type(),
            outcome = ?outcome,
            "resume delete partially failed"
        );
    } else {
        info!(
            command_type = command.command_type(),
            outcome = ?outcome,
            "resume deleted"
        );
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::NaiveDate;
    use uuid::Uuid;
    use vitae_core::error::DomainError;
    use vitae_core::repository::{AggregateCollection, ChildCollection};
    use vitae_test_support::{
        ContendedAggregateCollection, FailingAggregateCollection, FailingChildCollection, Faults,
        FaultyChildCollection, FixedClock, InMemoryAggregateCollection, InMemoryChildCollection,
        StalledChildCollection, fixed_now,
    };

    use super::*;
    use crate::domain::documents::{NewReference, NewWorkHistory};

    struct Harness {
        resumes: Arc<InMemoryAggregateCollection<Resume>>,
        work_history: Arc<InMemoryChildCollection<WorkHistory>>,
        references: Arc<InMemoryChildCollection<Reference>>,
        collections: ResumeCollections,
    }

    fn harness() -> Harness {
        let resumes = Arc::new(InMemoryAggregateCollection::<Resume>::new());
        let work_history = Arc::new(InMemoryChildCollection::<WorkHistory>::new());
        let references = Arc::new(InMemoryChildCollection::<Reference>::new());
        let collections = ResumeCollections::new(
            resumes.clone(),
            work_history.clone(),
            references.clone(),
        );
        Harness {
            resumes,
            work_history,
            references,
            collections,
        }
    }

    fn acme() -> NewWorkHistory {
        NewWorkHistory {
            company_name: "Acme".to_owned(),
            started_work: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            finished_work: NaiveDate::from_ymd_opt(2021, 1, 1),
            description: None,
        }
    }

    fn contact(name: &str) -> NewReference {
        NewReference {
            contact_name: name.to_owned(),
            contact_phone_no: None,
            contact_email: None,
        }
    }

    fn create_command(owner_id: &str) -> CreateResume {
        CreateResume {
            correlation_id: Uuid::new_v4(),
            owner_id: owner_id.to_owned(),
            cover_letter: Some("Hello".to_owned()),
            work_history: Some(vec![acme()]),
            references: Some(vec![contact("Jo")]),
        }
    }

    fn add_command(owner_id: &str, name: &str, key: Option<Uuid>) -> AddReference {
        AddReference {
            correlation_id: Uuid::new_v4(),
            owner_id: owner_id.to_owned(),
            reference: contact(name),
            idempotency_key: key,
        }
    }

    fn remove_command(owner_id: &str, reference_id: Uuid) -> RemoveReference {
        RemoveReference {
            correlation_id: Uuid::new_v4(),
            owner_id: owner_id.to_owned(),
            reference_id,
        }
    }

    /// Another writer changing the cover letter between our read and write.
    fn rival_cover_letter(resume: &Resume) -> Resume {
        let mut resume = resume.clone();
        resume.set_cover_letter(Some("Rival".to_owned()), fixed_now());
        resume
    }

    fn contended(
        writes: usize,
        references: Arc<dyn ChildCollection<Reference>>,
    ) -> (Arc<ContendedAggregateCollection<Resume>>, ResumeCollections) {
        let resumes = Arc::new(ContendedAggregateCollection::new(writes, rival_cover_letter));
        let collections = ResumeCollections::new(
            resumes.clone(),
            Arc::new(InMemoryChildCollection::<WorkHistory>::new()),
            references,
        );
        (resumes, collections)
    }

    #[tokio::test]
    async fn test_create_inserts_children_then_resume() {
        // Arrange
        let h = harness();
        let clock = FixedClock::default();

        // Act
        let resume = handle_create_resume(
            &create_command("u1"),
            &clock,
            &h.collections,
            FanOutPolicy::default(),
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(resume.owner_id, "u1");
        assert_eq!(resume.cover_letter.as_deref(), Some("Hello"));
        assert_eq!(resume.created_at, clock.0);
        assert_eq!(resume.updated_at, clock.0);

        let work_history = h.work_history.documents();
        assert_eq!(work_history.len(), 1);
        assert_eq!(resume.work_history_ids, vec![work_history[0].id]);
        assert_eq!(work_history[0].owner_id, "u1");
        assert_eq!(work_history[0].created_at, clock.0);

        let references = h.references.documents();
        assert_eq!(resume.reference_ids, vec![references[0].id]);
        assert_eq!(h.resumes.len(), 1);
    }

    #[tokio::test]
    async fn test_create_without_children_stores_empty_lists() {
        // Arrange
        let h = harness();
        let command = CreateResume {
            work_history: None,
            references: None,
            ..create_command("u1")
        };

        // Act
        let resume = handle_create_resume(
            &command,
            &FixedClock::default(),
            &h.collections,
            FanOutPolicy::default(),
        )
        .await
        .unwrap();

        // Assert
        assert!(resume.work_history_ids.is_empty());
        assert!(resume.reference_ids.is_empty());
        assert!(h.work_history.is_empty());
        assert!(h.references.is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_blank_owner() {
        let h = harness();

        let result = handle_create_resume(
            &create_command("  "),
            &FixedClock::default(),
            &h.collections,
            FanOutPolicy::default(),
        )
        .await;

        match result.unwrap_err() {
            DomainError::Validation(msg) => assert_eq!(msg, "owner_id must not be empty"),
            other => panic!("expected Validation, got {other:?}"),
        }
        assert!(h.work_history.is_empty());
    }

    #[tokio::test]
    async fn test_create_for_existing_owner_writes_no_children() {
        // Arrange
        let h = harness();
        let clock = FixedClock::default();
        handle_create_resume(&create_command("u1"), &clock, &h.collections, FanOutPolicy::default())
            .await
            .unwrap();

        // Act
        let outcome = run_create_resume_saga(
            &create_command("u1"),
            &clock,
            &h.collections,
            FanOutPolicy::default(),
        )
        .await;

        // Assert
        assert!(matches!(
            outcome,
            SagaOutcome::Aborted(DomainError::AlreadyExists(_))
        ));
        assert_eq!(h.work_history.len(), 1);
        assert_eq!(h.references.len(), 1);
        assert_eq!(h.resumes.len(), 1);
    }

    #[tokio::test]
    async fn test_create_reports_orphans_when_reference_batch_fails() {
        // Arrange
        let h = harness();
        let collections = ResumeCollections::new(
            h.resumes.clone(),
            h.work_history.clone(),
            Arc::new(FailingChildCollection),
        );

        // Act
        let outcome = run_create_resume_saga(
            &create_command("u1"),
            &FixedClock::default(),
            &collections,
            FanOutPolicy::default(),
        )
        .await;

        // Assert
        let stored_id = h.work_history.documents()[0].id;
        assert_eq!(
            outcome.orphans(),
            &[Orphan::new(WorkHistory::COLLECTION, stored_id)]
        );
        match outcome.into_result().unwrap_err() {
            DomainError::ChildWriteFailed { collection, .. } => {
                assert_eq!(collection, Reference::COLLECTION);
            }
            other => panic!("expected ChildWriteFailed, got {other:?}"),
        }
        assert!(h.resumes.is_empty());
    }

    #[tokio::test]
    async fn test_create_aborts_cleanly_when_only_batch_fails() {
        // Arrange
        let h = harness();
        let collections = ResumeCollections::new(
            h.resumes.clone(),
            Arc::new(FailingChildCollection),
            h.references.clone(),
        );
        let command = CreateResume {
            references: None,
            ..create_command("u1")
        };

        // Act
        let outcome = run_create_resume_saga(
            &command,
            &FixedClock::default(),
            &collections,
            FanOutPolicy::default(),
        )
        .await;

        // Assert
        assert!(matches!(
            outcome,
            SagaOutcome::Aborted(DomainError::ChildWriteFailed { .. })
        ));
        assert!(h.resumes.is_empty());
    }

    #[tokio::test]
    async fn test_create_times_out_stalled_batch() {
        // Arrange
        let h = harness();
        let collections = ResumeCollections::new(
            h.resumes.clone(),
            Arc::new(StalledChildCollection),
            h.references.clone(),
        );
        let policy = FanOutPolicy {
            max_in_flight: 4,
            deadline: Duration::from_millis(20),
        };

        // Act
        let outcome =
            run_create_resume_saga(&create_command("u1"), &FixedClock::default(), &collections, policy)
                .await;

        // Assert: the stalled batch's ids are reported as possibly written.
        let orphans = outcome.orphans().to_vec();
        assert_eq!(orphans.len(), 2);
        assert!(orphans.iter().any(|o| o.collection == WorkHistory::COLLECTION));
        match outcome.into_result().unwrap_err() {
            DomainError::ChildWriteFailed { collection, reason } => {
                assert_eq!(collection, WorkHistory::COLLECTION);
                assert!(reason.contains("deadline"));
            }
            other => panic!("expected ChildWriteFailed, got {other:?}"),
        }
        assert!(h.resumes.is_empty());
    }

    #[tokio::test]
    async fn test_add_reference_appends_at_end() {
        // Arrange
        let h = harness();
        let clock = FixedClock::default();
        let created = handle_create_resume(
            &create_command("u1"),
            &clock,
            &h.collections,
            FanOutPolicy::default(),
        )
        .await
        .unwrap();

        // Act
        let ids = handle_add_reference(&add_command("u1", "Sam", None), &clock, &h.collections)
            .await
            .unwrap();

        // Assert
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], created.reference_ids[0]);
        let added = h.references.find_by_id(ids[1]).await.unwrap().unwrap();
        assert_eq!(added.contact_name, "Sam");
        assert_eq!(added.owner_id, "u1");
    }

    #[tokio::test]
    async fn test_add_reference_without_resume_is_not_found() {
        let h = harness();

        let result =
            handle_add_reference(&add_command("nobody", "Sam", None), &FixedClock::default(), &h.collections)
                .await;

        assert!(matches!(result, Err(DomainError::NotFound(_))));
        assert!(h.references.is_empty());
    }

    #[tokio::test]
    async fn test_add_reference_insert_failure_is_child_write_failed() {
        // Arrange
        let h = harness();
        let clock = FixedClock::default();
        handle_create_resume(
            &CreateResume {
                references: None,
                ..create_command("u1")
            },
            &clock,
            &h.collections,
            FanOutPolicy::default(),
        )
        .await
        .unwrap();
        let collections = ResumeCollections::new(
            h.resumes.clone(),
            h.work_history.clone(),
            Arc::new(FailingChildCollection),
        );

        // Act
        let result = handle_add_reference(&add_command("u1", "Sam", None), &clock, &collections).await;

        // Assert
        assert!(matches!(result, Err(DomainError::ChildWriteFailed { .. })));
        assert!(h.resumes.documents()[0].document.reference_ids.is_empty());
    }

    #[tokio::test]
    async fn test_add_reference_retry_with_same_key_is_idempotent() {
        // Arrange
        let h = harness();
        let clock = FixedClock::default();
        handle_create_resume(&create_command("u1"), &clock, &h.collections, FanOutPolicy::default())
            .await
            .unwrap();
        let key = Uuid::new_v4();

        // Act
        let first = handle_add_reference(&add_command("u1", "Sam", Some(key)), &clock, &h.collections)
            .await
            .unwrap();
        let second = handle_add_reference(&add_command("u1", "Sam", Some(key)), &clock, &h.collections)
            .await
            .unwrap();

        // Assert
        assert_eq!(first, second);
        assert_eq!(first.last(), Some(&key));
        assert_eq!(h.references.len(), 2);
    }

    #[tokio::test]
    async fn test_add_reference_retry_links_orphan_from_interrupted_attempt() {
        // Arrange: a previous attempt inserted the document and crashed.
        let h = harness();
        let clock = FixedClock::default();
        handle_create_resume(
            &CreateResume {
                references: None,
                ..create_command("u1")
            },
            &clock,
            &h.collections,
            FanOutPolicy::default(),
        )
        .await
        .unwrap();
        let key = Uuid::new_v4();
        h.references
            .insert_one(&contact("Sam").to_document(key, "u1", clock.0))
            .await
            .unwrap();

        // Act
        let ids = handle_add_reference(&add_command("u1", "Sam", Some(key)), &clock, &h.collections)
            .await
            .unwrap();

        // Assert
        assert_eq!(ids, vec![key]);
        assert_eq!(h.references.len(), 1);
    }

    #[tokio::test]
    async fn test_add_reference_key_of_other_owner_is_rejected() {
        // Arrange
        let h = harness();
        let clock = FixedClock::default();
        for owner in ["u1", "u2"] {
            handle_create_resume(&create_command(owner), &clock, &h.collections, FanOutPolicy::default())
                .await
                .unwrap();
        }
        let key = Uuid::new_v4();
        handle_add_reference(&add_command("u1", "Sam", Some(key)), &clock, &h.collections)
            .await
            .unwrap();

        // Act
        let result =
            handle_add_reference(&add_command("u2", "Sam", Some(key)), &clock, &h.collections).await;

        // Assert
        assert!(matches!(result, Err(DomainError::AlreadyExists(_))));
        let u2 = h.resumes.find_by_owner("u2").await.unwrap().unwrap();
        assert!(!u2.document.reference_ids.contains(&key));
    }

    #[tokio::test]
    async fn test_remove_reference_unlinks_and_deletes() {
        // Arrange
        let h = harness();
        let clock = FixedClock::default();
        let created = handle_create_resume(
            &create_command("u1"),
            &clock,
            &h.collections,
            FanOutPolicy::default(),
        )
        .await
        .unwrap();
        let added = handle_add_reference(&add_command("u1", "Sam", None), &clock, &h.collections)
            .await
            .unwrap();
        let jo = created.reference_ids[0];

        // Act
        let ids = handle_remove_reference(&remove_command("u1", jo), &clock, &h.collections)
            .await
            .unwrap();

        // Assert
        assert_eq!(ids, vec![added[1]]);
        assert!(h.references.find_by_id(jo).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_unknown_reference_is_not_found() {
        let h = harness();
        let clock = FixedClock::default();
        handle_create_resume(&create_command("u1"), &clock, &h.collections, FanOutPolicy::default())
            .await
            .unwrap();

        let result =
            handle_remove_reference(&remove_command("u1", Uuid::new_v4()), &clock, &h.collections)
                .await;

        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_reference_without_resume_is_not_found() {
        let h = harness();

        let result = handle_remove_reference(
            &remove_command("nobody", Uuid::new_v4()),
            &FixedClock::default(),
            &h.collections,
        )
        .await;

        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_reference_never_deletes_other_owners_document() {
        // Arrange
        let h = harness();
        let clock = FixedClock::default();
        let u1 = handle_create_resume(&create_command("u1"), &clock, &h.collections, FanOutPolicy::default())
            .await
            .unwrap();
        handle_create_resume(&create_command("u2"), &clock, &h.collections, FanOutPolicy::default())
            .await
            .unwrap();
        let foreign = u1.reference_ids[0];

        // Act
        let result =
            handle_remove_reference(&remove_command("u2", foreign), &clock, &h.collections).await;

        // Assert
        assert!(matches!(result, Err(DomainError::NotFound(_))));
        assert!(h.references.find_by_id(foreign).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_reference_succeeds_when_document_delete_fails() {
        // Arrange
        let h = harness();
        let clock = FixedClock::default();
        let faulty = Arc::new(FaultyChildCollection::<Reference>::new(Faults {
            deletes: true,
            ..Faults::default()
        }));
        let collections =
            ResumeCollections::new(h.resumes.clone(), h.work_history.clone(), faulty.clone());
        let created =
            handle_create_resume(&create_command("u1"), &clock, &collections, FanOutPolicy::default())
                .await
                .unwrap();
        let jo = created.reference_ids[0];

        // Act
        let ids = handle_remove_reference(&remove_command("u1", jo), &clock, &collections)
            .await
            .unwrap();

        // Assert: unlinked; the document survives as an orphan.
        assert!(ids.is_empty());
        assert_eq!(faulty.inner().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_reference_retry_cleans_up_orphan() {
        // Arrange: the id was unlinked but the document survived.
        let h = harness();
        let clock = FixedClock::default();
        handle_create_resume(
            &CreateResume {
                references: None,
                ..create_command("u1")
            },
            &clock,
            &h.collections,
            FanOutPolicy::default(),
        )
        .await
        .unwrap();
        let orphan = Uuid::new_v4();
        h.references
            .insert_one(&contact("Jo").to_document(orphan, "u1", clock.0))
            .await
            .unwrap();

        // Act
        let ids = handle_remove_reference(&remove_command("u1", orphan), &clock, &h.collections)
            .await
            .unwrap();

        // Assert
        assert!(ids.is_empty());
        assert!(h.references.is_empty());
    }

    #[tokio::test]
    async fn test_update_cover_letter_refreshes_updated_at() {
        // Arrange
        let h = harness();
        handle_create_resume(
            &create_command("u1"),
            &FixedClock::default(),
            &h.collections,
            FanOutPolicy::default(),
        )
        .await
        .unwrap();
        let later = FixedClock(FixedClock::default().0 + chrono::Duration::hours(1));
        let command = UpdateCoverLetter {
            correlation_id: Uuid::new_v4(),
            owner_id: "u1".to_owned(),
            cover_letter: Some("Updated".to_owned()),
        };

        // Act
        let resume = handle_update_cover_letter(&command, &later, &h.collections)
            .await
            .unwrap();

        // Assert
        assert_eq!(resume.cover_letter.as_deref(), Some("Updated"));
        assert_eq!(resume.updated_at, later.0);
        let stored = h.resumes.find_by_owner("u1").await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.document, resume);
    }

    #[tokio::test]
    async fn test_update_cover_letter_without_resume_is_not_found() {
        let h = harness();
        let command = UpdateCoverLetter {
            correlation_id: Uuid::new_v4(),
            owner_id: "nobody".to_owned(),
            cover_letter: None,
        };

        let result = handle_update_cover_letter(&command, &FixedClock::default(), &h.collections).await;

        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_resume_and_children() {
        // Arrange
        let h = harness();
        handle_create_resume(
            &create_command("u1"),
            &FixedClock::default(),
            &h.collections,
            FanOutPolicy::default(),
        )
        .await
        .unwrap();
        let command = DeleteResume {
            correlation_id: Uuid::new_v4(),
            owner_id: "u1".to_owned(),
        };

        // Act
        let outcome = handle_delete_resume(&command, &h.collections, FanOutPolicy::default())
            .await
            .unwrap();

        // Assert
        assert_eq!(outcome.resume, StepOutcome::Deleted { count: 1 });
        assert_eq!(outcome.work_history, StepOutcome::Deleted { count: 1 });
        assert_eq!(outcome.references, StepOutcome::Deleted { count: 1 });
        assert!(h.resumes.is_empty());
        assert!(h.work_history.is_empty());
        assert!(h.references.is_empty());
    }

    #[tokio::test]
    async fn test_delete_reports_each_step_independently() {
        // Arrange
        let h = harness();
        handle_create_resume(
            &create_command("u1"),
            &FixedClock::default(),
            &h.collections,
            FanOutPolicy::default(),
        )
        .await
        .unwrap();
        let collections = ResumeCollections::new(
            h.resumes.clone(),
            Arc::new(FailingChildCollection),
            h.references.clone(),
        );
        let command = DeleteResume {
            correlation_id: Uuid::new_v4(),
            owner_id: "u1".to_owned(),
        };

        // Act
        let outcome = handle_delete_resume(&command, &collections, FanOutPolicy::default())
            .await
            .unwrap();

        // Assert
        assert!(outcome.has_failures());
        assert_eq!(outcome.resume, StepOutcome::Deleted { count: 1 });
        assert!(outcome.work_history.is_failed());
        assert_eq!(outcome.references, StepOutcome::Deleted { count: 1 });
        assert_eq!(h.work_history.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_with_failing_resume_store_still_clears_children() {
        // Arrange
        let h = harness();
        handle_create_resume(
            &create_command("u1"),
            &FixedClock::default(),
            &h.collections,
            FanOutPolicy::default(),
        )
        .await
        .unwrap();
        let collections = ResumeCollections::new(
            Arc::new(FailingAggregateCollection),
            h.work_history.clone(),
            h.references.clone(),
        );
        let command = DeleteResume {
            correlation_id: Uuid::new_v4(),
            owner_id: "u1".to_owned(),
        };

        // Act
        let outcome = handle_delete_resume(&command, &collections, FanOutPolicy::default())
            .await
            .unwrap();

        // Assert
        match &outcome.resume {
            StepOutcome::Failed { reason } => assert!(reason.contains("connection refused")),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(h.work_history.is_empty());
        assert!(h.references.is_empty());
    }

    #[tokio::test]
    async fn test_add_reference_retries_past_concurrent_writes() {
        // Arrange
        let references = Arc::new(InMemoryChildCollection::<Reference>::new());
        let (resumes, collections) = contended(2, references.clone());
        let clock = FixedClock::default();
        let created =
            handle_create_resume(&create_command("u1"), &clock, &collections, FanOutPolicy::default())
                .await
                .unwrap();

        // Act
        let ids = handle_add_reference(&add_command("u1", "Sam", None), &clock, &collections)
            .await
            .unwrap();

        // Assert: appended once, and the rival's writes were not overwritten.
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], created.reference_ids[0]);
        let sam = ids[1];
        assert_eq!(ids.iter().filter(|id| **id == sam).count(), 1);
        let stored = resumes.find_by_owner("u1").await.unwrap().unwrap();
        assert_eq!(stored.document.reference_ids, ids);
        assert_eq!(stored.document.cover_letter.as_deref(), Some("Rival"));
        assert_eq!(stored.version, 4);
        assert_eq!(resumes.contended_remaining(), 0);
        assert_eq!(references.len(), 2);
    }

    #[tokio::test]
    async fn test_add_reference_surfaces_conflict_after_three_attempts() {
        // Arrange
        let references = Arc::new(InMemoryChildCollection::<Reference>::new());
        let (resumes, collections) = contended(3, references.clone());
        let clock = FixedClock::default();
        let created =
            handle_create_resume(&create_command("u1"), &clock, &collections, FanOutPolicy::default())
                .await
                .unwrap();

        // Act
        let result = handle_add_reference(&add_command("u1", "Sam", None), &clock, &collections).await;

        // Assert
        match result.unwrap_err() {
            DomainError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual,
            } => {
                assert_eq!(aggregate_id, created.id);
                assert_eq!(expected, 3);
                assert_eq!(actual, 4);
            }
            other => panic!("expected ConcurrencyConflict, got {other:?}"),
        }
        let stored = resumes.inner().documents()[0].clone();
        assert_eq!(stored.document.reference_ids, created.reference_ids);
        assert_eq!(resumes.contended_remaining(), 0);
        // The inserted document is left unlinked.
        assert_eq!(references.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_reference_retries_past_concurrent_writes() {
        // Arrange: deletes fail, so success depends on the id having been listed.
        let faulty = Arc::new(FaultyChildCollection::<Reference>::new(Faults {
            deletes: true,
            ..Faults::default()
        }));
        let (resumes, collections) = contended(2, faulty.clone());
        let clock = FixedClock::default();
        let created =
            handle_create_resume(&create_command("u1"), &clock, &collections, FanOutPolicy::default())
                .await
                .unwrap();
        let jo = created.reference_ids[0];

        // Act
        let ids = handle_remove_reference(&remove_command("u1", jo), &clock, &collections)
            .await
            .unwrap();

        // Assert
        assert!(ids.is_empty());
        let stored = resumes.find_by_owner("u1").await.unwrap().unwrap();
        assert!(stored.document.reference_ids.is_empty());
        assert_eq!(stored.document.cover_letter.as_deref(), Some("Rival"));
        assert_eq!(stored.version, 4);
        assert_eq!(faulty.inner().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_reference_surfaces_conflict_after_three_attempts() {
        // Arrange
        let references = Arc::new(InMemoryChildCollection::<Reference>::new());
        let (resumes, collections) = contended(3, references.clone());
        let clock = FixedClock::default();
        let created =
            handle_create_resume(&create_command("u1"), &clock, &collections, FanOutPolicy::default())
                .await
                .unwrap();
        let jo = created.reference_ids[0];

        // Act
        let result = handle_remove_reference(&remove_command("u1", jo), &clock, &collections).await;

        // Assert: still listed, document untouched.
        assert!(matches!(
            result,
            Err(DomainError::ConcurrencyConflict { .. })
        ));
        let stored = resumes.find_by_owner("u1").await.unwrap().unwrap();
        assert_eq!(stored.document.reference_ids, vec![jo]);
        assert!(references.find_by_id(jo).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_cover_letter_surfaces_conflict_after_three_attempts() {
        let (resumes, collections) =
            contended(3, Arc::new(InMemoryChildCollection::<Reference>::new()));
        let clock = FixedClock::default();
        handle_create_resume(&create_command("u1"), &clock, &collections, FanOutPolicy::default())
            .await
            .unwrap();
        let command = UpdateCoverLetter {
            correlation_id: Uuid::new_v4(),
            owner_id: "u1".to_owned(),
            cover_letter: Some("Mine".to_owned()),
        };

        let result = handle_update_cover_letter(&command, &clock, &collections).await;

        assert!(matches!(
            result,
            Err(DomainError::ConcurrencyConflict { .. })
        ));
        let stored = resumes.find_by_owner("u1").await.unwrap().unwrap();
        assert_eq!(stored.document.cover_letter.as_deref(), Some("Rival"));
    }

    #[tokio::test]
    async fn test_add_reference_replay_after_orphaned_remove_relinks() {
        // Arrange: the remove unlinked the id but could not delete the document.
        let faulty = Arc::new(FaultyChildCollection::<Reference>::new(Faults {
            deletes: true,
            ..Faults::default()
        }));
        let h = harness();
        let collections =
            ResumeCollections::new(h.resumes.clone(), h.work_history.clone(), faulty.clone());
        let clock = FixedClock::default();
        handle_create_resume(
            &CreateResume {
                references: None,
                ..create_command("u1")
            },
            &clock,
            &collections,
            FanOutPolicy::default(),
        )
        .await
        .unwrap();
        let key = Uuid::new_v4();
        let add = add_command("u1", "Sam", Some(key));
        handle_add_reference(&add, &clock, &collections).await.unwrap();
        let removed = handle_remove_reference(&remove_command("u1", key), &clock, &collections)
            .await
            .unwrap();

        // Act
        let replayed = handle_add_reference(&add, &clock, &collections).await.unwrap();

        // Assert: the surviving document is treated as the earlier insert.
        assert!(removed.is_empty());
        assert_eq!(replayed, vec![key]);
        assert_eq!(faulty.inner().len(), 1);
    }
}
