//! HTTP-level integration tests for the card sequence endpoints.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, delete_as, get_as, post_json_as, put_json_as, seed_project, OTHER_USER, TEST_USER,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use storyboard_api::router::build_app_router;

const CARDS: &str = "/api/v1/projects/p1/cards";

fn titles(json: &Value) -> Vec<String> {
    json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["title"].as_str().unwrap().to_string())
        .collect()
}

fn assert_dense(json: &Value) {
    let cards = json["data"].as_array().unwrap();
    for (i, card) in cards.iter().enumerate() {
        assert_eq!(card["order_index"], i as i64);
        assert_eq!(card["scene_number"], i as i64 + 1);
        let prev = if i == 0 { Value::Null } else { cards[i - 1]["id"].clone() };
        let next = cards.get(i + 1).map(|c| c["id"].clone()).unwrap_or(Value::Null);
        assert_eq!(card["prev_card_id"], prev);
        assert_eq!(card["next_card_id"], next);
    }
}

/// Append `titles` one by one through the API and return the last response.
async fn append_all(pool: &PgPool, titles: &[&str]) -> Value {
    let mut last = Value::Null;
    for title in titles {
        let app = common::build_test_app(pool.clone());
        let response = post_json_as(app, CARDS, TEST_USER, json!({ "title": title })).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        last = body_json(response).await;
    }
    last
}

// ---------------------------------------------------------------------------
// Insert / list
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn insert_at_index_returns_reindexed_sequence(pool: PgPool) {
    seed_project(&pool, "p1", TEST_USER).await;
    append_all(&pool, &["A", "C"]).await;

    let app = common::build_test_app(pool.clone());
    let response =
        post_json_as(app, CARDS, TEST_USER, json!({ "title": "B", "index": 1 })).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(titles(&json), ["A", "B", "C"]);
    assert_dense(&json);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_reads_stored_order(pool: PgPool) {
    seed_project(&pool, "p1", TEST_USER).await;
    append_all(&pool, &["A", "B"]).await;

    // Fresh state, so the sequence is loaded from storage.
    let app = common::build_test_app(pool);
    let response = get_as(app, CARDS, TEST_USER).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(titles(&json), ["A", "B"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn insert_out_of_range_is_400(pool: PgPool) {
    seed_project(&pool, "p1", TEST_USER).await;

    let app = common::build_test_app(pool);
    let response =
        post_json_as(app, CARDS, TEST_USER, json!({ "title": "X", "index": 5 })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn other_users_project_is_403(pool: PgPool) {
    seed_project(&pool, "p1", OTHER_USER).await;

    let app = common::build_test_app(pool);
    let response = get_as(app, CARDS, TEST_USER).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_project_is_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get_as(app, CARDS, TEST_USER).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Delete / reorder
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_removes_exactly_one_card(pool: PgPool) {
    seed_project(&pool, "p1", TEST_USER).await;
    let created = append_all(&pool, &["A", "B", "C"]).await;
    let b_id = created["data"][1]["id"].as_str().unwrap().to_string();

    let app = common::build_test_app(pool.clone());
    let response = delete_as(app, &format!("{CARDS}/{b_id}"), TEST_USER).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(titles(&json), ["A", "C"]);
    assert_dense(&json);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cards WHERE project_id = 'p1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_unknown_card_is_404(pool: PgPool) {
    seed_project(&pool, "p1", TEST_USER).await;

    let app = common::build_test_app(pool);
    let response = delete_as(app, &format!("{CARDS}/missing"), TEST_USER).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn reorder_moves_card(pool: PgPool) {
    seed_project(&pool, "p1", TEST_USER).await;
    append_all(&pool, &["A", "B", "C"]).await;

    let app = common::build_test_app(pool);
    let response = post_json_as(
        app,
        &format!("{CARDS}/reorder"),
        TEST_USER,
        json!({ "from": 0, "to": 2 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(titles(&json), ["B", "C", "A"]);
    assert_dense(&json);
}

// ---------------------------------------------------------------------------
// Batch update
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn batch_update_writes_all_cards(pool: PgPool) {
    seed_project(&pool, "p1", TEST_USER).await;
    let created = append_all(&pool, &["A", "B"]).await;
    let ids: Vec<&str> = created["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();

    let app = common::build_test_app(pool.clone());
    let response = put_json_as(
        app,
        &format!("{CARDS}/batch"),
        TEST_USER,
        json!({ "cards": [
            { "id": ids[0], "dialogue": "Hello" },
            { "id": ids[1], "title": "B2" },
        ]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let app = common::build_test_app(pool);
    let listed = body_json(get_as(app, CARDS, TEST_USER).await).await;
    assert_eq!(titles(&listed), ["A", "B2"]);
    assert_eq!(listed["data"][0]["dialogue"], "Hello");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn batch_update_with_unknown_id_changes_nothing(pool: PgPool) {
    seed_project(&pool, "p1", TEST_USER).await;
    let created = append_all(&pool, &["A"]).await;
    let a_id = created["data"][0]["id"].as_str().unwrap().to_string();

    let app = common::build_test_app(pool.clone());
    let response = put_json_as(
        app,
        &format!("{CARDS}/batch"),
        TEST_USER,
        json!({ "cards": [
            { "id": a_id, "title": "Changed" },
            { "id": "missing", "title": "Nope" },
        ]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let title: String = sqlx::query_scalar("SELECT title FROM cards WHERE id = $1")
        .bind(&a_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(title, "A");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn ordering_batch_after_reorder_is_not_overwritten(pool: PgPool) {
    seed_project(&pool, "p1", TEST_USER).await;
    let created = append_all(&pool, &["A", "B", "C"]).await;
    let ids: Vec<String> = created["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect();

    // One state, so the reorder batch is still in its queue.
    let state = common::test_state(pool.clone());
    let app = build_app_router(state.clone(), &common::test_config());
    let response = post_json_as(
        app,
        &format!("{CARDS}/reorder"),
        TEST_USER,
        json!({ "from": 0, "to": 2 }),
    )
    .await;
    assert_eq!(titles(&body_json(response).await), ["B", "C", "A"]);

    let restore: Vec<Value> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            json!({
                "id": id,
                "order_index": i,
                "scene_number": i + 1,
                "prev_card_id": i.checked_sub(1).map(|p| ids[p].clone()),
                "next_card_id": ids.get(i + 1),
            })
        })
        .collect();
    let app = build_app_router(state.clone(), &common::test_config());
    let response = put_json_as(
        app,
        &format!("{CARDS}/batch"),
        TEST_USER,
        json!({ "cards": restore }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    state.frames.queue().flush("p1").wait().await;
    let app = build_app_router(state, &common::test_config());
    let listed = body_json(get_as(app, CARDS, TEST_USER).await).await;
    assert_eq!(titles(&listed), ["A", "B", "C"]);
    assert_dense(&listed);

    let stored: Vec<String> =
        sqlx::query_scalar("SELECT title FROM cards WHERE project_id = 'p1' ORDER BY order_index")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(stored, ["A", "B", "C"]);
}
