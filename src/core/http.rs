//! HTTP surface of the signal store using Axum

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Json, Response},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{debug, info, Level};

use crate::metrics::Metrics;
use crate::models::signal::StoreState;
use crate::store::SignalStore;

pub const SERVICE_NAME: &str = "signalbridge-api";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SignalStore>,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
}

impl AppState {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            store: Arc::new(SignalStore::new()),
            metrics,
            start_time: Arc::new(Instant::now()),
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let uptime_seconds = state.start_time.elapsed().as_secs();
    Json(json!({
        "status": "healthy",
        "uptime_seconds": uptime_seconds,
        "service": SERVICE_NAME
    }))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();

    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();

    state.metrics.http_requests_in_flight.dec();

    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

/// Service banner with the current record
async fn index(State(state): State<AppState>) -> Json<Value> {
    let current = state.store.get().await;
    Json(json!({
        "status": "Signal API running",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /signal": "Get current signal",
            "POST /signal": "Set new signal",
            "DELETE /signal": "Clear signal"
        },
        "currentSignal": current
    }))
}

async fn get_signal(State(state): State<AppState>) -> Json<StoreState> {
    Json(state.store.get().await)
}

/// Any body is accepted; anything that is not a JSON object counts as `{}`
async fn post_signal(State(state): State<AppState>, body: Bytes) -> Json<Value> {
    let partial = match serde_json::from_slice::<Value>(&body) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) | Err(_) => {
            debug!(bytes = body.len(), "POST /signal body is not a JSON object, treating as empty");
            json!({})
        }
    };

    let signal = state.store.upsert(&partial).await;
    state.metrics.signal_upserts_total.inc();

    Json(json!({
        "success": true,
        "message": "Signal saved",
        "signal": signal
    }))
}

async fn delete_signal(State(state): State<AppState>) -> Json<Value> {
    state.store.reset().await;
    Json(json!({ "success": true, "message": "Signal cleared" }))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route(
            "/signal",
            get(get_signal).post(post_signal).delete(delete_signal),
        )
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn start_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let metrics = Arc::new(Metrics::new()?);
    let state = AppState::new(metrics);
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, "HTTP server listening on port {}", port);
    info!("Signal endpoint available at http://0.0.0.0:{}/signal", port);
    axum::serve(listener, app).await?;

    Ok(())
}
