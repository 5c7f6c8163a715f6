//! Route definitions for a project's cards.

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::handlers::cards;
use crate::state::AppState;

/// Routes mounted at `/projects/{project_id}/cards`.
///
/// ```text
/// GET    /                 -> list
/// POST   /                 -> create
/// PUT    /batch            -> batch_update
/// POST   /reorder          -> reorder
/// DELETE /{card_id}        -> delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(cards::list).post(cards::create))
        .route("/batch", put(cards::batch_update))
        .route("/reorder", post(cards::reorder))
        .route("/{card_id}", delete(cards::delete))
}
