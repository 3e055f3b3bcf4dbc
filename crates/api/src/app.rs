use axum::{routing::get, Router};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::Config;
use crate::middleware::metrics::metrics_handler;
use crate::routes::health;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
}

/// Build the probe router: health checks and Prometheus metrics. All
/// registration operations are a library surface, not HTTP routes.
pub fn create_app(config: Config, pool: PgPool) -> Router {
    let request_timeout = Duration::from_secs(config.server.request_timeout_secs);

    let state = AppState {
        pool,
        config: Arc::new(config),
    };

    Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/live", get(health::liveness))
        .route("/api/health/ready", get(health::readiness))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
