//! Reviewer assignment and review handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use reviewforge_common::{auth::ActorContext, domain::Ratings, errors::Result};
use reviewforge_workflow::{AssignOptions, ManuscriptView, PendingAssignment, ReviewView};

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub reviewer_id: Uuid,

    /// Editor override for a flagged plagiarism score
    #[serde(default)]
    pub override_plagiarism: bool,

    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(nested)]
    pub ratings: Ratings,

    #[validate(length(max = 20000))]
    #[serde(default)]
    pub comments: String,
}

pub async fn assign_reviewer(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignRequest>,
) -> Result<(StatusCode, Json<ManuscriptView>)> {
    let options = AssignOptions {
        override_plagiarism: request.override_plagiarism,
        due_at: request.due_at,
    };
    let view = state
        .engine
        .assign_reviewer(id, request.reviewer_id, options, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Reviewer declines their pending assignment on the current revision
pub async fn decline_assignment(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ManuscriptView>> {
    Ok(Json(state.engine.decline_assignment(id, &actor).await?))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ReviewView>>> {
    Ok(Json(state.engine.list_reviews(id, &actor).await?))
}

pub async fn submit_review(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
    Json(request): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<ManuscriptView>)> {
    request.validate()?;

    let view = state
        .engine
        .submit_review(id, request.ratings, request.comments, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Reviewer's open assignments, earliest due first
pub async fn pending_assignments(
    State(state): State<AppState>,
    actor: ActorContext,
) -> Result<Json<Vec<PendingAssignment>>> {
    let pending = state.engine.pending_assignments(&actor).await?;
    Ok(Json(pending))
}

/// Reviews written by the calling reviewer
pub async fn my_reviews(
    State(state): State<AppState>,
    actor: ActorContext,
) -> Result<Json<Vec<ReviewView>>> {
    let reviews = state.engine.reviews_by_reviewer(&actor).await?;
    Ok(Json(reviews))
}
