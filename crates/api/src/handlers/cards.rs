//! Handlers for a project's ordered card sequence.
//!
//! Insert, delete and reorder go through the in-memory frame store and
//! return the full reindexed sequence; batch updates are written in one
//! transaction once the project's queued ordering writes have landed. All endpoints require authentication via
//! [`AuthUser`] and ownership of the project.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use storyboard_core::card::{CardPatch, NewCard};
use storyboard_db::repositories::CardRepo;

use super::owned_project;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /projects/{project_id}/cards`.
#[derive(Debug, Deserialize)]
pub struct CreateCardRequest {
    /// Target position; appended when absent.
    pub index: Option<usize>,
    #[serde(flatten)]
    pub card: NewCard,
}

/// Body of `PUT /projects/{project_id}/cards/batch`.
#[derive(Debug, Deserialize)]
pub struct BatchUpdateRequest {
    pub cards: Vec<CardPatch>,
}

/// Body of `POST /projects/{project_id}/cards/reorder`.
#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub from: usize,
    pub to: usize,
}

/// GET /api/v1/projects/{project_id}/cards
pub async fn list(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    owned_project(&state, &project_id, &auth.user_id).await?;
    let cards = state.frames.load(&project_id).await?;
    Ok(Json(DataResponse { data: cards }))
}

/// POST /api/v1/projects/{project_id}/cards
pub async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(input): Json<CreateCardRequest>,
) -> AppResult<impl IntoResponse> {
    owned_project(&state, &project_id, &auth.user_id).await?;
    if input.card.title.trim().is_empty() {
        return Err(AppError::BadRequest("title must not be empty".into()));
    }

    let cards = state
        .frames
        .insert(&project_id, &auth.user_id, input.card, input.index)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: cards })))
}

/// PUT /api/v1/projects/{project_id}/cards/batch
///
/// All-or-nothing: an unknown id or a card of another project rolls the
/// whole batch back.
pub async fn batch_update(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(input): Json<BatchUpdateRequest>,
) -> AppResult<impl IntoResponse> {
    owned_project(&state, &project_id, &auth.user_id).await?;

    let touches_order = input.cards.iter().any(CardPatch::touches_order);
    if touches_order {
        // Earlier reorder/delete batches must not land on top of this one.
        state.frames.queue().flush(&project_id).wait().await;
    }

    let updated =
        CardRepo::batch_update(&state.pool, &state.schema, &project_id, &input.cards).await?;

    if touches_order {
        // Ordering came from outside the store; reload on next access.
        state.frames.evict(&project_id).await;
    } else {
        for card in &updated {
            state.frames.refresh_card(card).await;
        }
    }

    tracing::info!(project_id = %project_id, count = updated.len(), "Cards batch updated");
    Ok(Json(DataResponse { data: updated }))
}

/// POST /api/v1/projects/{project_id}/cards/reorder
pub async fn reorder(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(input): Json<ReorderRequest>,
) -> AppResult<impl IntoResponse> {
    owned_project(&state, &project_id, &auth.user_id).await?;
    let cards = state
        .frames
        .reorder(&project_id, input.from, input.to)
        .await?;
    Ok(Json(DataResponse { data: cards }))
}

/// DELETE /api/v1/projects/{project_id}/cards/{card_id}
pub async fn delete(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((project_id, card_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    owned_project(&state, &project_id, &auth.user_id).await?;
    let cards = state.frames.delete(&project_id, &card_id).await?;
    Ok(Json(DataResponse { data: cards }))
}
