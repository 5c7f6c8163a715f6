//! Route definitions for storyboards.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::storyboards;
use crate::state::AppState;

/// Request/response routes mounted at `/storyboards`.
///
/// ```text
/// POST   /                 -> create
/// GET    /{id}             -> get_by_id
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(storyboards::create))
        .route("/{id}", get(storyboards::get_by_id))
}
