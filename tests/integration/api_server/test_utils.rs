//! Test utilities for API server integration tests

use axum_test::TestServer;
use signalbridge::core::http::{create_router, AppState};
use signalbridge::metrics::Metrics;
use signalbridge::store::SignalStore;
use std::sync::Arc;

/// Test helper for API server integration tests
#[allow(dead_code)]
pub struct TestApiServer {
    pub server: TestServer,
    pub metrics: Arc<Metrics>,
    pub store: Arc<SignalStore>,
}

impl TestApiServer {
    pub async fn new() -> Self {
        let metrics = Arc::new(Metrics::new().expect("metrics initialization"));
        let state = AppState::new(metrics.clone());
        let store = state.store.clone();

        let app = create_router(state);
        let server = TestServer::new(app).expect("start test server");

        Self {
            server,
            metrics,
            store,
        }
    }
}
