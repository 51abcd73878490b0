//! Integration tests for the API Server
//!
//! Tests the signal endpoints, health check and metrics.

#[path = "api_server/test_utils.rs"]
mod test_utils;

use axum::http::{HeaderName, HeaderValue};
use serde_json::{json, Value};

use test_utils::TestApiServer;

#[tokio::test]
async fn health_endpoint_reports_healthy_status() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime_seconds"].as_u64().is_some());
    assert_eq!(body["service"], "signalbridge-api");
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_metrics() {
    let app = TestApiServer::new().await;
    app.server.post("/signal").json(&json!({"pair": "EURUSD"})).await;

    let response = app.server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);

    let body = response.text();
    assert!(body.contains("http_requests_total"));
    assert!(body.contains("http_request_duration_seconds"));
    assert!(body.contains("signal_upserts_total 1"));
}

#[tokio::test]
async fn empty_store_returns_zero_record() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/signal").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["pair"], "");
    assert_eq!(body["action"], "");
    assert_eq!(body["tp1"], 0.0);
    assert!(body["timestamp"].is_null());
}

#[tokio::test]
async fn post_then_get_returns_saved_signal() {
    let app = TestApiServer::new().await;
    let response = app
        .server
        .post("/signal")
        .json(&json!({
            "pair": "EURUSD",
            "action": "buy",
            "entry_min": 1.1,
            "entry_max": "1.105",
            "stop_loss": 1.095,
            "tp1": 1.11,
            "tp2": 1.12,
            "tp_full": 1.13,
            "confidence": 0.82,
            "setup": "London breakout"
        }))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Signal saved");
    assert_eq!(body["signal"]["action"], "BUY");
    assert_eq!(body["signal"]["entry_max"], 1.105);

    let current: Value = app.server.get("/signal").await.json();
    assert_eq!(current, body["signal"]);
    assert_eq!(current["confidence"], 0.82);
    assert!(current["timestamp"].is_string());
}

#[tokio::test]
async fn malformed_body_is_treated_as_empty_object() {
    let app = TestApiServer::new().await;
    app.server
        .post("/signal")
        .json(&json!({"pair": "GBPUSD", "tp1": 1.3}))
        .await;

    let response = app.server.post("/signal").text("this is not json").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["signal"]["pair"], "GBPUSD");
    assert_eq!(body["signal"]["tp1"], 0.0);
    assert_eq!(body["signal"]["action"], "");
}

#[tokio::test]
async fn delete_clears_the_signal() {
    let app = TestApiServer::new().await;
    app.server
        .post("/signal")
        .json(&json!({"pair": "EURUSD", "tp1": 1.11}))
        .await;

    let response = app.server.delete("/signal").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body, json!({"success": true, "message": "Signal cleared"}));

    let current: Value = app.server.get("/signal").await.json();
    assert_eq!(current["pair"], "");
    assert!(current["timestamp"].is_null());
}

#[tokio::test]
async fn index_lists_endpoints_and_current_signal() {
    let app = TestApiServer::new().await;
    app.store.upsert(&json!({"pair": "XAUUSD"})).await;

    let body: Value = app.server.get("/").await.json();
    assert_eq!(body["status"], "Signal API running");
    assert!(body["version"].is_string());
    assert!(body["endpoints"]["GET /signal"].is_string());
    assert!(body["endpoints"]["POST /signal"].is_string());
    assert!(body["endpoints"]["DELETE /signal"].is_string());
    assert_eq!(body["currentSignal"]["pair"], "XAUUSD");
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let app = TestApiServer::new().await;
    let response = app
        .server
        .get("/signal")
        .add_header(
            HeaderName::from_static("origin"),
            HeaderValue::from_static("https://www.tradingview.com"),
        )
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.header("access-control-allow-origin"), "*");
}
