//! Liveness and state of the service's in-memory parts.

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database is unreachable.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    /// Build sessions currently held in memory.
    pub live_sessions: usize,
    /// Projects whose card sequence is cached.
    pub cached_projects: usize,
    /// Projects with ordering writes still being applied.
    pub write_workers: usize,
    /// Columns omitted from writes because the live schema lacks them.
    pub missing_columns: Vec<String>,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = storyboard_db::health_check(&state.pool).await.is_ok();
    let missing_columns = state.schema.missing_columns();

    let status = if db_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        live_sessions: state.sessions.session_count().await,
        cached_projects: state.frames.cached_projects(),
        write_workers: state.frames.queue().worker_count(),
        missing_columns,
    })
}

/// Mounted at the root, outside `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
