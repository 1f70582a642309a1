//! HTTP boundary: submission validation and intake behavior through the
//! axum router, exercised with tower's oneshot utility.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use swapline::api::{create_router, AppState};
use swapline::config::{ProviderConfig, QueueConfig};
use swapline::{
    Broadcaster, JobQueue, MemoryJobStore, MemoryStatusSink, MockDexRouter, OrderPipeline,
};
use tower::util::ServiceExt;

struct TestApp {
    router: axum::Router,
    broadcaster: Arc<Broadcaster>,
    store: Arc<MemoryJobStore>,
    queue: Arc<JobQueue>,
}

fn test_app() -> TestApp {
    let broadcaster = Broadcaster::new(Duration::from_secs(60));
    let store = Arc::new(MemoryJobStore::new());
    let provider = Arc::new(MockDexRouter::new(&ProviderConfig {
        quote_latency_ms: 0,
        swap_latency_ms: 0,
        stage_timeout_ms: 0,
    }));
    let pipeline = Arc::new(OrderPipeline::new(
        provider,
        Arc::clone(&broadcaster),
        Arc::new(MemoryStatusSink::new()),
        0,
    ));
    let queue = JobQueue::start(
        QueueConfig {
            workers: 1,
            max_attempts: 1,
            base_backoff_ms: 1,
        },
        pipeline,
        Arc::clone(&broadcaster),
        store.clone(),
    );
    let state = AppState::new(Arc::clone(&queue), Arc::clone(&broadcaster));
    TestApp {
        router: create_router(state),
        broadcaster,
        store,
        queue,
    }
}

fn post_execute(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/orders/execute")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn valid_submission_returns_order_id() {
    let app = test_app();
    let response = app
        .router
        .clone()
        .oneshot(post_execute(json!({
            "tokenIn": "SOL",
            "tokenOut": "USDC",
            "amount": "2.5",
            "slippage": "0.02"
        })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let order_id = body["orderId"].as_str().expect("orderId present");
    assert!(uuid::Uuid::parse_str(order_id).is_ok());

    app.queue.shutdown().await;
    assert_eq!(app.store.len().await, 1);
}

#[tokio::test]
async fn same_token_submission_is_rejected_without_trace() {
    let app = test_app();
    let response = app
        .router
        .clone()
        .oneshot(post_execute(json!({
            "tokenIn": "SOL",
            "tokenOut": "SOL",
            "amount": "2"
        })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().expect("error").contains("must differ"));

    // Nothing enqueued, nothing recorded.
    app.queue.shutdown().await;
    assert!(app.store.is_empty().await);
    assert_eq!(app.broadcaster.active_orders(), 0);
}

#[tokio::test]
async fn non_positive_amount_is_rejected() {
    let app = test_app();
    for amount in ["0", "-3"] {
        let response = app
            .router
            .clone()
            .oneshot(post_execute(json!({
                "tokenIn": "SOL",
                "tokenOut": "USDC",
                "amount": amount
            })))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
    app.queue.shutdown().await;
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn storage_loss_surfaces_as_server_error() {
    let app = test_app();
    app.store.reject_inserts(true);
    let response = app
        .router
        .clone()
        .oneshot(post_execute(json!({
            "tokenIn": "SOL",
            "tokenOut": "USDC",
            "amount": "1"
        })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error")
        .contains("Queue intake failed"));
    app.store.reject_inserts(false);
    app.queue.shutdown().await;
}

#[tokio::test]
async fn health_reports_uptime_and_depth() {
    let app = test_app();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["uptimeSeconds"].is_number());
    assert!(body["queueDepth"].is_number());
    app.queue.shutdown().await;
}
