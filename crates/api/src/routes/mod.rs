pub mod cards;
pub mod health;
pub mod storyboards;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` request/response route tree.
///
/// Route hierarchy:
///
/// ```text
/// /storyboards                                     start a build (POST)
/// /storyboards/{id}                                persisted snapshot
///
/// /projects/{project_id}/cards                     list, insert
/// /projects/{project_id}/cards/batch               batch update (PUT)
/// /projects/{project_id}/cards/reorder             move from -> to (POST)
/// /projects/{project_id}/cards/{card_id}           delete
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/storyboards", storyboards::router())
        .nest("/projects/{project_id}/cards", cards::router())
}

/// Build the `/api/v1` streaming route tree (no request timeout).
///
/// ```text
/// /storyboards/{id}/stream                         SSE progress stream
/// ```
pub fn stream_routes() -> Router<AppState> {
    Router::new().route(
        "/storyboards/{id}/stream",
        get(handlers::storyboards::stream),
    )
}
