//! Integration tests for storyboard builds and their SSE streams.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, body_text, get, get_as, post_json_as, seed_project, sse_data, sse_event_names,
    token_for, TEST_USER,
};
use serde_json::json;
use sqlx::PgPool;

const SCRIPT: &str = "Title: Two Places\n\n\
    A cozy coffee shop interior\n\n\
    Cozy coffee shop interior, different angle\n\n\
    A busy city street at night\n\n\
    Busy city street, different angle";

/// Start a build without images and return the storyboard id.
async fn start_build(pool: &PgPool) -> String {
    let app = common::build_test_app(pool.clone());
    let response = post_json_as(
        app,
        "/api/v1/storyboards",
        TEST_USER,
        json!({ "script": SCRIPT, "generate_images": false }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = body_json(response).await;
    assert_eq!(json["data"]["title"], "Two Places");
    assert_eq!(json["data"]["frame_count"], 4);
    json["data"]["storyboard_id"].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Builds
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn build_persists_inherited_backgrounds(pool: PgPool) {
    let id = start_build(&pool).await;

    let app = common::build_test_app(pool);
    let response = get_as(app, &format!("/api/v1/storyboards/{id}"), TEST_USER).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["storyboardId"], id.as_str());
    let frames = json["data"]["frames"].as_array().unwrap();
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[0]["background"], frames[1]["background"]);
    assert_ne!(frames[1]["background"], frames[2]["background"]);
    assert_eq!(frames[2]["background"], frames[3]["background"]);
    assert_eq!(frames[0]["status"], "pending");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn build_with_images_but_no_generator_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let response = post_json_as(
        app,
        "/api/v1/storyboards",
        TEST_USER,
        json!({ "script": SCRIPT }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["code"], "CONFIGURATION_ERROR");

    let projects: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(projects, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn empty_script_is_400(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_json_as(
        app,
        "/api/v1/storyboards",
        TEST_USER,
        json!({ "script": "   ", "generate_images": false }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn live_session_stream_replays_and_closes(pool: PgPool) {
    // Build and stream through the same state so the session is live.
    let state = common::test_state(pool);
    let app = storyboard_api::router::build_app_router(state.clone(), &common::test_config());
    let response = post_json_as(
        app,
        "/api/v1/storyboards",
        TEST_USER,
        json!({ "script": SCRIPT, "generate_images": false }),
    )
    .await;
    let id = body_json(response).await["data"]["storyboard_id"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(state.sessions.get(&id).await.is_some());

    let app = storyboard_api::router::build_app_router(state, &common::test_config());
    let response = get_as(app, &format!("/api/v1/storyboards/{id}/stream"), TEST_USER).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    let body = body_text(response).await;
    assert_eq!(sse_event_names(&body), ["init", "complete", "end"]);
    let data = sse_data(&body);
    assert_eq!(data[0]["storyboardId"], id.as_str());
    assert_eq!(data[0]["frames"].as_array().unwrap().len(), 4);
    assert_eq!(data[1]["status"], "complete");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn snapshot_stream_emits_init_complete_end(pool: PgPool) {
    let id = start_build(&pool).await;

    // A fresh state has no session, so the stored rows are served.
    let app = common::build_test_app(pool);
    let response = get_as(app, &format!("/api/v1/storyboards/{id}/stream"), TEST_USER).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert_eq!(sse_event_names(&body), ["init", "complete", "end"]);
    let data = sse_data(&body);
    assert_eq!(data[0]["status"], "complete");
    assert_eq!(data[0]["title"], "Two Places");
    assert_eq!(data[1]["frames"].as_array().unwrap().len(), 4);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn snapshot_of_empty_project_still_streams(pool: PgPool) {
    seed_project(&pool, "p-empty", TEST_USER).await;

    let app = common::build_test_app(pool);
    let response = get_as(app, "/api/v1/storyboards/p-empty/stream", TEST_USER).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert_eq!(sse_event_names(&body), ["init", "complete", "end"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_storyboard_stream_is_404_without_events(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get_as(app, "/api/v1/storyboards/nope/stream", TEST_USER).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_text(response).await;
    assert!(sse_event_names(&body).is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn stream_accepts_token_in_query(pool: PgPool) {
    let id = start_build(&pool).await;

    let app = common::build_test_app(pool);
    let uri = format!(
        "/api/v1/storyboards/{id}/stream?access_token={}",
        token_for(TEST_USER)
    );
    let response = get(app, &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
}
