//! Tests for the JSON HTTP API.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use family_tracker::{
    Dispatcher, MemoryStore, StoreError, StoredState, TrackerConfig, TrackerId, TrackerState,
    TrackerStore,
};
use family_tracker_server::api;

fn app() -> Router {
    api::router(Dispatcher::new(Arc::new(MemoryStore::new())))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_as(app, method, uri, body, None).await
}

async fn send_as(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    actor: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(actor) = actor {
        builder = builder.header(api::ACTOR_HEADER, actor);
    }
    let body = body.map_or_else(Body::empty, |v| Body::from(v.to_string()));
    let response = app
        .clone()
        .oneshot(builder.body(body).expect("Failed to build request"))
        .await
        .expect("Request failed");

    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let value = serde_json::from_slice(&bytes).expect("Body is not JSON");
    (status, value)
}

async fn configure(app: &Router, id: i64, mode: &str, participants: &[&str]) {
    let (status, body) = send(
        app,
        "PUT",
        &format!("/trackers/{id}"),
        Some(json!({
            "title": "Chores",
            "mode": mode,
            "participants": participants,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["status"], json!("ok"));
}

#[tokio::test]
async fn test_advance_turn_returns_new_participant() {
    let app = app();
    configure(&app, 1, "rotation", &["Jacey", "Simon"]).await;

    let (status, body) = send(
        &app,
        "POST",
        "/actions/advance_turn",
        Some(json!({"tracker_id": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"success": true, "data": {"new_participant_name": "Simon"}})
    );
}

#[tokio::test]
async fn test_update_points_and_view_history() {
    let app = app();
    configure(&app, 2, "points", &["Mom", "Dad"]).await;

    let (status, body) = send_as(
        &app,
        "POST",
        "/actions/update_points",
        Some(json!({"tracker_id": 2, "participant": "Dad", "direction": "subtract"})),
        Some("mom"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"participant": "Dad", "new_score": -1}));

    let (status, body) = send(&app, "GET", "/trackers/2", None).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(
        data["scores"],
        json!([{"participant": "Mom", "score": 0}, {"participant": "Dad", "score": -1}])
    );
    assert_eq!(data["history"][0]["actor"], json!("mom"));
    assert_eq!(data["history"][0]["action"], json!("update_points"));
    assert_eq!(data["history"][0]["details"], json!("Subtract point for Dad"));
}

#[tokio::test]
async fn test_missing_actor_is_guest() {
    let app = app();
    configure(&app, 3, "random", &["Alice", "Bob"]).await;
    let (status, _) = send(
        &app,
        "POST",
        "/actions/random_pick",
        Some(json!({"tracker_id": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/trackers/3", None).await;
    assert_eq!(body["data"]["history"][0]["actor"], json!("guest"));
}

#[tokio::test]
async fn test_override_random_accepts_outsider() {
    let app = app();
    configure(&app, 4, "random", &["Jacey"]).await;
    let (status, body) = send(
        &app,
        "POST",
        "/actions/override_random",
        Some(json!({"tracker_id": 4, "winner": "Simon", "reason": "fairness check"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"winner_name": "Simon"}));
}

#[tokio::test]
async fn test_error_statuses() {
    let app = app();
    configure(&app, 5, "points", &["Mom", "Dad"]).await;
    configure(&app, 6, "manual", &[]).await;

    let cases = [
        (
            "/actions/advance_turn",
            json!({"tracker_id": 99}),
            StatusCode::NOT_FOUND,
            "not_found",
        ),
        (
            "/actions/advance_turn",
            json!({"tracker_id": 5}),
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_action",
        ),
        (
            "/actions/update_points",
            json!({"tracker_id": 5, "participant": "Kid", "direction": "add"}),
            StatusCode::UNPROCESSABLE_ENTITY,
            "participant_not_found",
        ),
        (
            "/actions/advance_turn",
            json!({"tracker_id": 6}),
            StatusCode::UNPROCESSABLE_ENTITY,
            "empty_participants",
        ),
        (
            "/actions/update_points",
            json!({"tracker_id": 5, "participant": "Mom"}),
            StatusCode::BAD_REQUEST,
            "invalid_input",
        ),
        (
            "/actions/advance_turn",
            json!({"tracker_id": 0}),
            StatusCode::BAD_REQUEST,
            "invalid_input",
        ),
        (
            "/actions/jump_around",
            json!({"tracker_id": 5}),
            StatusCode::BAD_REQUEST,
            "invalid_input",
        ),
    ];

    for (uri, request, status, kind) in cases {
        let (actual, body) = send(&app, "POST", uri, Some(request.clone())).await;
        assert_eq!(actual, status, "{uri} {request}");
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"]["kind"], json!(kind), "{uri} {request}");
    }
}

#[tokio::test]
async fn test_malformed_body_is_invalid_input() {
    let app = app();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/actions/advance_turn")
                .body(Body::from("{not json"))
                .expect("Failed to build request"),
        )
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_put_rejects_duplicate_participants() {
    let (status, body) = send(
        &app(),
        "PUT",
        "/trackers/1",
        Some(json!({"title": "Chores", "mode": "manual", "participants": ["Mom", "mom"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], json!("invalid_input"));
}

#[tokio::test]
async fn test_list_orders_by_title() {
    let app = app();
    for (id, title) in [(1, "Trash"), (2, "Dishes")] {
        let (status, _) = send(
            &app,
            "PUT",
            &format!("/trackers/{id}"),
            Some(json!({"title": title, "mode": "manual", "participants": ["A"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, "GET", "/trackers", None).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<_> = body["data"]
        .as_array()
        .expect("Expected an array")
        .iter()
        .map(|v| v["config"]["title"].clone())
        .collect();
    assert_eq!(titles, [json!("Dishes"), json!("Trash")]);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (status, body) = send(&app(), "GET", "/nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], json!("not_found"));
}

/// Which failure [`FaultyStore`] reports on every state write.
#[derive(Debug, Clone, Copy)]
enum Fault {
    Conflict,
    Backend,
}

/// Reads and saves normally, but every state write fails.
#[derive(Debug)]
struct FaultyStore {
    inner: MemoryStore,
    fault: Fault,
}

impl TrackerStore for FaultyStore {
    fn get_tracker(&self, id: TrackerId) -> Result<Option<TrackerConfig>, StoreError> {
        self.inner.get_tracker(id)
    }

    fn get_state(&self, id: TrackerId) -> Result<Option<StoredState>, StoreError> {
        self.inner.get_state(id)
    }

    fn put_state(
        &self,
        id: TrackerId,
        _state: &TrackerState,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        Err(match self.fault {
            Fault::Conflict => StoreError::VersionConflict {
                tracker_id: id,
                expected: Some(expected_version),
            },
            Fault::Backend => StoreError::backend("disk I/O error"),
        })
    }

    fn save_tracker(
        &self,
        id: TrackerId,
        config: &TrackerConfig,
        state: &TrackerState,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        self.inner.save_tracker(id, config, state, expected_version)
    }

    fn list_trackers(&self) -> Result<Vec<(TrackerId, TrackerConfig)>, StoreError> {
        self.inner.list_trackers()
    }
}

fn faulty_app(fault: Fault) -> Router {
    api::router(Dispatcher::new(Arc::new(FaultyStore {
        inner: MemoryStore::new(),
        fault,
    })))
}

#[tokio::test]
async fn test_persistent_version_conflict_is_409() {
    let app = faulty_app(Fault::Conflict);
    configure(&app, 1, "manual", &["A", "B"]).await;

    let (status, body) = send(
        &app,
        "POST",
        "/actions/advance_turn",
        Some(json!({"tracker_id": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"]["kind"], json!("conflict"));

    let (_, body) = send(&app, "GET", "/trackers/1", None).await;
    assert_eq!(body["data"]["history"], json!([]));
}

#[tokio::test]
async fn test_backend_failure_is_500() {
    let app = faulty_app(Fault::Backend);
    configure(&app, 1, "points", &["Mom", "Dad"]).await;

    let (status, body) = send(
        &app,
        "POST",
        "/actions/update_points",
        Some(json!({"tracker_id": 1, "participant": "Mom", "direction": "add"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"]["kind"], json!("storage"));
}
