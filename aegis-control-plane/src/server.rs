//! # HTTP Server
//!
//! Builds the axum [`Router`] for the safety-and-steering control plane:
//! process, health, metrics, and a small admin surface over the router,
//! optimizer, and emergency shutdown manager. The core subsystem (wired up
//! in [`crate::wiring`]) has no HTTP dependency of its own; this module is
//! the thin transport layer in front of it.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

use crate::config::Config;
use crate::middleware::{cors_middleware, logging_middleware, metrics_middleware};
use crate::wiring::Wiring;

/// Shared application state for all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub wiring: Arc<Wiring>,
}

pub async fn create_server(config: Config) -> anyhow::Result<Router> {
    let wiring = Arc::new(Wiring::assemble(&config)?);

    if config.server.cors.enabled && config.server.cors.allowed_origins.iter().any(|o| o == "*") {
        tracing::warn!(
            "CORS is enabled with wildcard origins. This is unsafe for production. Configure explicit allowed_origins."
        );
    }

    let state = AppState { config: Arc::new(config.clone()), wiring };

    let app = Router::new()
        .route("/v1/process", post(crate::handlers::process))
        .route("/health", get(crate::handlers::health_check))
        .route("/metrics", get(crate::handlers::metrics))
        .route("/admin/router", get(crate::handlers::router_status))
        .route("/admin/optimizer", get(crate::handlers::optimizer_status))
        .route("/admin/shutdown", post(crate::handlers::trigger_shutdown))
        .layer(
            ServiceBuilder::new()
                .layer(cors_middleware(&config.server.cors))
                .layer(axum::middleware::from_fn_with_state(state.clone(), logging_middleware))
                .layer(axum::middleware::from_fn_with_state(state.clone(), metrics_middleware))
                .layer(TimeoutLayer::new(config.server.timeout)),
        )
        .with_state(state);

    Ok(app)
}
