//! Query handlers for the resume context.

use tracing::{debug, instrument, warn};
use uuid::Uuid;
use vitae_core::command::require_owner;
use vitae_core::document::Document;
use vitae_core::error::DomainError;
use vitae_core::repository::ChildCollection;

use crate::application::collections::ResumeCollections;
use crate::application::fanout::{FanOutError, FanOutPolicy, gather_ordered};
use crate::domain::documents::{Resume, ResumeView};

/// Fetches every listed child, in list order.
///
/// A missing id, a child owned by someone else, a failed fetch or an
/// elapsed deadline all mean the resume no longer matches storage.
async fn materialize<T: Document>(
    collection: &dyn ChildCollection<T>,
    resume: &Resume,
    ids: &[Uuid],
    policy: FanOutPolicy,
) -> Result<Vec<T>, DomainError> {
    let owner_id = resume.owner_id.as_str();
    gather_ordered(ids.iter().copied(), policy, |id| async move {
        match collection.find_by_id(id).await? {
            Some(child) if child.owner_id() == owner_id => Ok(child),
            Some(_) => Err(DomainError::inconsistent(
                resume.id,
                format!("{} {id} belongs to another owner", T::COLLECTION),
            )),
            None => Err(DomainError::inconsistent(
                resume.id,
                format!("{} {id} is missing", T::COLLECTION),
            )),
        }
    })
    .await
    .map_err(|err| match err {
        FanOutError::Failed {
            source: source @ DomainError::InconsistentAggregate { .. },
            ..
        } => source,
        FanOutError::Failed { index, source } => DomainError::inconsistent(
            resume.id,
            format!("{} {} could not be read: {source}", T::COLLECTION, ids[index]),
        ),
        FanOutError::DeadlineElapsed(_) => DomainError::inconsistent(
            resume.id,
            format!("{} lookup: {err}", T::COLLECTION),
        ),
    })
}

/// Returns the owner's resume with its children materialized in the order
/// the resume lists them.
///
/// Both child lists are fetched concurrently, each with at most
/// `policy.max_in_flight` lookups in flight.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the owner has no resume, and
/// `DomainError::InconsistentAggregate` if any listed child cannot be
/// resolved. A partial view is never returned.
#[instrument(skip(collections, policy))]
pub async fn get_resume(
    owner_id: &str,
    collections: &ResumeCollections,
    policy: FanOutPolicy,
) -> Result<ResumeView, DomainError> {
    require_owner(owner_id)?;

    let Some(found) = collections.resumes.find_by_owner(owner_id).await? else {
        return Err(DomainError::NotFound(format!("resume for owner {owner_id}")));
    };
    let resume = found.document;

    let (work_history, references) = tokio::try_join!(
        materialize(
            collections.work_history.as_ref(),
            &resume,
            &resume.work_history_ids,
            policy
        ),
        materialize(
            collections.references.as_ref(),
            &resume,
            &resume.reference_ids,
            policy
        ),
    )
    .inspect_err(|err| warn!(error = %err, "resume could not be assembled"))?;

    debug!(
        resume_id = %resume.id,
        work_history = work_history.len(),
        references = references.len(),
        "resume assembled"
    );
    Ok(ResumeView::assemble(resume, work_history, references))
}
