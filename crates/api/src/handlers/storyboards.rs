//! Handlers for storyboard builds and their progress streams.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use storyboard_core::error::CoreError;
use storyboard_core::frame_cache::{FrameCache, FrameView};
use storyboard_events::{resolve_source, SnapshotLoader};
use storyboard_pipeline::StoryboardRequest;

use super::owned_project;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::sse::event_stream;
use crate::state::AppState;

/// Persisted storyboard as returned by `GET /storyboards/{id}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryboardView {
    pub storyboard_id: String,
    pub title: String,
    pub frames: Vec<Arc<FrameView>>,
}

fn not_found(id: &str) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Storyboard",
        id: id.to_string(),
    })
}

/// Ownership check that reports a missing project as a missing storyboard.
async fn check_owner(state: &AppState, id: &str, user_id: &str) -> AppResult<()> {
    owned_project(state, id, user_id)
        .await
        .map(|_| ())
        .map_err(|e| match e {
            AppError::Core(CoreError::NotFound { .. }) => not_found(id),
            other => other,
        })
}

/// POST /api/v1/storyboards
///
/// Stores the frames and returns 202; images are generated in the
/// background and reported on the stream.
pub async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<StoryboardRequest>,
) -> AppResult<impl IntoResponse> {
    let started = state.pipeline.start(&auth.user_id, input).await?;
    tracing::info!(
        storyboard_id = %started.storyboard_id,
        user_id = %auth.user_id,
        frame_count = started.frame_count,
        "Storyboard build started"
    );
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: started })))
}

/// GET /api/v1/storyboards/{id}
pub async fn get_by_id(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    check_owner(&state, &id, &auth.user_id).await?;
    let snapshot = state
        .pool
        .load_snapshot(&id)
        .await?
        .ok_or_else(|| not_found(&id))?;

    let frames = FrameCache::new().views(&snapshot.frames);
    Ok(Json(DataResponse {
        data: StoryboardView {
            storyboard_id: snapshot.storyboard_id,
            title: snapshot.title,
            frames,
        },
    }))
}

/// GET /api/v1/storyboards/{id}/stream
///
/// Live session when one is held in memory, else the stored rows; 404 with
/// no events when neither exists.
pub async fn stream(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    check_owner(&state, &id, &auth.user_id).await?;

    let source = resolve_source(&state.sessions, &state.pool, &id)
        .await?
        .ok_or_else(|| not_found(&id))?;

    tracing::debug!(storyboard_id = %id, user_id = %auth.user_id, "Stream opened");
    Ok(event_stream(
        source.into_events(),
        Duration::from_secs(state.config.sse_keepalive_secs),
    ))
}
