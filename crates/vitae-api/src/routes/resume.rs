//! Routes for the resume context.

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use vitae_resume::application::{command_handlers, query_handlers};
use vitae_resume::domain::commands;
use vitae_resume::domain::documents::{NewReference, NewWorkHistory, Resume, ResumeView};
use vitae_resume::domain::saga::DeleteOutcome;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /set-resume.
#[derive(Debug, Deserialize)]
pub struct SetResumeRequest {
    /// The owning user.
    pub owner_id: String,
    /// Optional cover letter.
    #[serde(default)]
    pub cover_letter: Option<String>,
    /// Initial work-history entries.
    #[serde(default)]
    pub work_history: Option<Vec<NewWorkHistory>>,
    /// Initial references.
    #[serde(default)]
    pub references: Option<Vec<NewReference>>,
}

/// Query string for GET /get-resume.
#[derive(Debug, Deserialize)]
pub struct GetResumeQuery {
    /// The owning user.
    pub owner_id: String,
}

/// Request body for POST /add-reference.
#[derive(Debug, Deserialize)]
pub struct AddReferenceRequest {
    /// The owning user.
    pub owner_id: String,
    /// The reference to add.
    pub reference: NewReference,
    /// Reuse the same key when retrying so the reference is added once.
    #[serde(default)]
    pub idempotency_key: Option<Uuid>,
}

/// Request body for POST /delete-reference.
#[derive(Debug, Deserialize)]
pub struct DeleteReferenceRequest {
    /// The owning user.
    pub owner_id: String,
    /// The reference to remove.
    pub reference_id: Uuid,
}

/// Request body for POST /update-resume.
#[derive(Debug, Deserialize)]
pub struct UpdateResumeRequest {
    /// The owning user.
    pub owner_id: String,
    /// New cover letter; `null` or absent clears it.
    #[serde(default)]
    pub cover_letter: Option<String>,
}

/// Request body for POST /delete-resume.
#[derive(Debug, Deserialize)]
pub struct DeleteResumeRequest {
    /// The owning user.
    pub owner_id: String,
}

/// Response body for the reference commands.
#[derive(Debug, Serialize)]
pub struct ReferenceIdsResponse {
    /// The resume's reference ids after the command.
    pub reference_ids: Vec<Uuid>,
}

/// POST /set-resume
#[instrument(skip(state, request), fields(owner_id = %request.owner_id))]
async fn set_resume(
    State(state): State<AppState>,
    Json(request): Json<SetResumeRequest>,
) -> Result<Json<Resume>, ApiError> {
    let command = commands::CreateResume {
        correlation_id: Uuid::new_v4(),
        owner_id: request.owner_id,
        cover_letter: request.cover_letter,
        work_history: request.work_history,
        references: request.references,
    };

    info!(correlation_id = %command.correlation_id, "handling create_resume command");

    let resume = command_handlers::handle_create_resume(
        &command,
        state.clock.as_ref(),
        &state.collections,
        state.fan_out,
    )
    .await?;

    Ok(Json(resume))
}

/// GET /get-resume?owner_id=
#[instrument(skip(state, query), fields(owner_id = %query.owner_id))]
async fn get_resume(
    State(state): State<AppState>,
    Query(query): Query<GetResumeQuery>,
) -> Result<Json<ResumeView>, ApiError> {
    let view = query_handlers::get_resume(&query.owner_id, &state.collections, state.fan_out).await?;
    Ok(Json(view))
}

/// POST /add-reference
#[instrument(skip(state, request), fields(owner_id = %request.owner_id))]
async fn add_reference(
    State(state): State<AppState>,
    Json(request): Json<AddReferenceRequest>,
) -> Result<Json<ReferenceIdsResponse>, ApiError> {
    let command = commands::AddReference {
        correlation_id: Uuid::new_v4(),
        owner_id: request.owner_id,
        reference: request.reference,
        idempotency_key: request.idempotency_key,
    };

    info!(correlation_id = %command.correlation_id, "handling add_reference command");

    let reference_ids =
        command_handlers::handle_add_reference(&command, state.clock.as_ref(), &state.collections)
            .await?;

    Ok(Json(ReferenceIdsResponse { reference_ids }))
}

/// POST /delete-reference
#[instrument(skip(state, request), fields(owner_id = %request.owner_id, reference_id = %request.reference_id))]
async fn delete_reference(
    State(state): State<AppState>,
    Json(request): Json<DeleteReferenceRequest>,
) -> Result<Json<ReferenceIdsResponse>, ApiError> {
    let command = commands::RemoveReference {
        correlation_id: Uuid::new_v4(),
        owner_id: request.owner_id,
        reference_id: request.reference_id,
    };

    info!(correlation_id = %command.correlation_id, "handling remove_reference command");

    let reference_ids = command_handlers::handle_remove_reference(
        &command,
        state.clock.as_ref(),
        &state.collections,
    )
    .await?;

    Ok(Json(ReferenceIdsResponse { reference_ids }))
}

/// POST /update-resume
#[instrument(skip(state, request), fields(owner_id = %request.owner_id))]
async fn update_resume(
    State(state): State<AppState>,
    Json(request): Json<UpdateResumeRequest>,
) -> Result<Json<Resume>, ApiError> {
    let command = commands::UpdateCoverLetter {
        correlation_id: Uuid::new_v4(),
        owner_id: request.owner_id,
        cover_letter: request.cover_letter,
    };

    info!(correlation_id = %command.correlation_id, "handling update_cover_letter command");

    let resume = command_handlers::handle_update_cover_letter(
        &command,
        state.clock.as_ref(),
        &state.collections,
    )
    .await?;

    Ok(Json(resume))
}

/// POST /delete-resume
#[instrument(skip(state, request), fields(owner_id = %request.owner_id))]
async fn delete_resume(
    State(state): State<AppState>,
    Json(request): Json<DeleteResumeRequest>,
) -> Result<Json<DeleteOutcome>, ApiError> {
    let command = commands::DeleteResume {
        correlation_id: Uuid::new_v4(),
        owner_id: request.owner_id,
    };

    info!(correlation_id = %command.correlation_id, "handling delete_resume command");

    let outcome =
        command_handlers::handle_delete_resume(&command, &state.collections, state.fan_out).await?;

    Ok(Json(outcome))
}

/// Returns the router for the resume context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/set-resume", post(set_resume))
        .route("/get-resume", get(get_resume))
        .route("/add-reference", post(add_reference))
        .route("/delete-reference", post(delete_reference))
        .route("/update-resume", post(update_resume))
        .route("/delete-resume", post(delete_resume))
}
