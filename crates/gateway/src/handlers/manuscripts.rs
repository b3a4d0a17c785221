//! Manuscript lifecycle handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use reviewforge_common::{
    auth::ActorContext,
    domain::{Decision, ManuscriptDraft, ManuscriptStatus, PlagiarismResult, RevisionDraft},
    errors::Result,
};
use reviewforge_workflow::{AggregateSummary, ClosedCycle, ManuscriptView};

/// Verdict posted by the plagiarism checker
#[derive(Debug, Deserialize, Validate)]
pub struct PlagiarismRequest {
    pub checked: bool,

    #[validate(range(min = 0.0, max = 1.0))]
    pub score: f64,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: Decision,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<ManuscriptStatus>,
}

/// List manuscripts visible to the actor, optionally by status
pub async fn list_manuscripts(
    State(state): State<AppState>,
    actor: ActorContext,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ManuscriptView>>> {
    let manuscripts = state.engine.list_manuscripts(&actor, params.status).await?;
    Ok(Json(manuscripts))
}

/// Submit a new manuscript
pub async fn create_manuscript(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(draft): Json<ManuscriptDraft>,
) -> Result<(StatusCode, Json<ManuscriptView>)> {
    let view = state.engine.submit(draft, &actor).await?;

    tracing::info!(
        manuscript_id = %view.id,
        author_id = %actor.actor_id,
        "Manuscript created"
    );

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_manuscript(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ManuscriptView>> {
    Ok(Json(state.engine.get_manuscript(id, &actor).await?))
}

/// Plagiarism checker callback
pub async fn record_plagiarism(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
    Json(request): Json<PlagiarismRequest>,
) -> Result<Json<ManuscriptView>> {
    request.validate()?;

    let result = PlagiarismResult::new(request.checked, request.score)?;
    Ok(Json(state.engine.record_plagiarism_result(id, result, &actor).await?))
}

/// Close the current review cycle and return the aggregate
pub async fn close_review_cycle(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ClosedCycle>> {
    Ok(Json(state.engine.close_review_cycle(id, &actor).await?))
}

pub async fn decide(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<ManuscriptView>> {
    Ok(Json(state.engine.decide(id, request.decision, &actor).await?))
}

/// Answer a revision request with the next revision
pub async fn submit_revision(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
    Json(draft): Json<RevisionDraft>,
) -> Result<(StatusCode, Json<ManuscriptView>)> {
    let view = state.engine.submit_revision(id, draft, &actor).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_aggregate(
    State(state): State<AppState>,
    actor: ActorContext,
    Path((id, revision_number)): Path<(Uuid, u32)>,
) -> Result<Json<AggregateSummary>> {
    Ok(Json(state.engine.get_aggregate(id, revision_number, &actor).await?))
}
