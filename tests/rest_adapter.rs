//! Integration tests for the REST adapter, driven through `tower::ServiceExt::oneshot`
//! against the real `axum::Router` — no network socket involved.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use rppg_ingest::config::Config;
use rppg_ingest::processor::HeuristicProcessor;
use rppg_ingest::routes::router;
use rppg_ingest::state::AppState;

fn test_app() -> axum::Router {
    let state = AppState::new(Config::default(), Arc::new(HeuristicProcessor));
    router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check_ok() {
    let app = test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "ok": true }));
}

#[tokio::test]
async fn start_without_consent_is_rejected() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/sessions/start")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "consent": false }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["detail"], "consent_required");
}

#[tokio::test]
async fn start_with_consent_returns_session_params() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/sessions/start")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "consent": true }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["session_id"].is_string());
    assert_eq!(body["max_chunk_size"], 10);
    assert_eq!(body["mock_mode"], true);
}

#[tokio::test]
async fn eleventh_start_from_same_ip_is_rate_limited() {
    let app = test_app();

    for _ in 0..10 {
        let request = Request::builder()
            .method("POST")
            .uri("/sessions/start")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "consent": true }).to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let request = Request::builder()
        .method("POST")
        .uri("/sessions/start")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "consent": true }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn end_session_is_idempotent() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/sessions/end")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "session_id": uuid::Uuid::new_v4().to_string() }).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder()
        .method("POST")
        .uri("/sessions/end")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "session_id": uuid::Uuid::new_v4().to_string() }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn chunk_then_end_via_rest_returns_result() {
    let app = test_app();

    let start_request = Request::builder()
        .method("POST")
        .uri("/sessions/start")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "consent": true }).to_string()))
        .unwrap();
    let start_response = app.clone().oneshot(start_request).await.unwrap();
    let params = body_json(start_response).await;
    let session_id = params["session_id"].as_str().unwrap().to_string();

    let chunk_request = Request::builder()
        .method("POST")
        .uri(format!("/sessions/{session_id}/chunk"))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "chunk_seq": 0, "n": 1, "frames": ["AAAA"] }).to_string(),
        ))
        .unwrap();
    let chunk_response = app.clone().oneshot(chunk_request).await.unwrap();
    assert_eq!(chunk_response.status(), StatusCode::OK);
    let ack = body_json(chunk_response).await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["chunk_seq"], 0);
    assert_eq!(ack["received"], 1);

    let end_request = Request::builder()
        .method("POST")
        .uri(format!("/sessions/{session_id}/end"))
        .body(Body::empty())
        .unwrap();
    let end_response = app.oneshot(end_request).await.unwrap();
    assert_eq!(end_response.status(), StatusCode::OK);
    let result = body_json(end_response).await;
    assert_eq!(result["type"], "result");
    assert!(result["quality"].is_string());
}
