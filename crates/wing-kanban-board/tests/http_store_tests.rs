/*
[INPUT]:  Mock REST responses for the hosted task table
[OUTPUT]: Test results for TaskStore over the real HTTP client
[POS]:    Integration tests - store + REST client
[UPDATE]: When request shapes or reconciliation behavior change
*/

use std::sync::Arc;

use tokio_test::assert_ok;
use wing_kanban_adapter::{Direction, KanbanClient, Stage, TaskId};
use wing_kanban_board::{LoadOutcome, SyncOutcome, TaskStore};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rows() -> serde_json::Value {
    serde_json::json!([
        {"id": 1, "title": "Sketch board", "status": "To Do", "created_at": "2026-03-01T10:00:00+00:00"},
        {"id": 2, "title": "Wire realtime", "status": "In Progress", "created_at": "2026-03-02T10:00:00+00:00"}
    ])
}

async fn store_for(server: &MockServer) -> TaskStore {
    let client = assert_ok!(KanbanClient::new(&server.uri(), "anon-key"));
    TaskStore::new(Arc::new(client))
}

#[tokio::test]
async fn test_failed_patch_triggers_full_reload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/tasks"))
        .and(query_param("order", "created_at.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows()))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/tasks"))
        .and(query_param("id", "eq.1"))
        .and(body_json(serde_json::json!({"status": "In Progress"})))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(serde_json::json!({"message": "boom"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    assert_eq!(store.load().await, LoadOutcome::Remote);

    let outcome = store.move_task(&TaskId::from(1), Direction::Forward).await;
    assert_eq!(outcome, SyncOutcome::Reconciled);
    assert_eq!(store.find(&TaskId::from(1)).unwrap().status, Stage::ToDo);
}

#[tokio::test]
async fn test_add_posts_first_stage_and_keeps_server_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/tasks"))
        .and(body_json(serde_json::json!({"title": "Ship it", "status": "To Do"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!([
            {"id": 3, "title": "Ship it", "status": "To Do", "created_at": "2026-03-03T10:00:00+00:00"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    store.load().await;
    let created = assert_ok!(store.add_task("Ship it").await).expect("created");

    assert_eq!(created.id, TaskId::from(3));
    assert_eq!(store.tasks().len(), 3);
    assert_eq!(store.tasks_by_status(Stage::ToDo).len(), 2);
}

#[tokio::test]
async fn test_delete_sends_id_filter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/tasks"))
        .and(query_param("id", "eq.2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    store.load().await;

    assert_eq!(store.delete_task(&TaskId::from(2)).await, SyncOutcome::Applied);
    assert!(store.find(&TaskId::from(2)).is_none());
}
