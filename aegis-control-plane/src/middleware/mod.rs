//! # HTTP Middleware
//!
//! Logging, metrics, and CORS layers for the ambient HTTP surface. The
//! safety-and-steering subsystem itself has no HTTP dependency; these
//! middlewares only instrument the thin axum layer in front of it.

use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{self, Request};
use axum::middleware::Next;
use axum::response::Response;
use tower_http::cors::{Any, CorsLayer};

use crate::config::CorsConfig;
use crate::server::AppState;

/// Logs method, URI, status, and latency for every request.
pub async fn logging_middleware(
    State(_state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();

    let response = next.run(req).await;

    let latency = start.elapsed();
    let status = response.status();
    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        latency_ms = latency.as_millis(),
        "request processed"
    );

    response
}

/// Publishes per-request latency as a metric, skipping the health/metrics
/// endpoints themselves.
pub async fn metrics_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let uri = req.uri().clone();

    let response = next.run(req).await;

    let should_record = !uri.path().starts_with("/health") && !uri.path().starts_with("/metrics");
    if should_record {
        let latency_ms = start.elapsed().as_millis() as f64;
        let mut dimensions = std::collections::HashMap::new();
        dimensions.insert("path".to_string(), uri.path().to_string());
        dimensions.insert("status".to_string(), response.status().as_u16().to_string());
        crate::external::MetricSink::publish(
            state.wiring.metrics_sink.as_ref(),
            "http",
            "request_latency_ms",
            latency_ms,
            "milliseconds",
            &dimensions,
        )
        .await;
    }

    response
}

pub fn cors_middleware(cors_config: &CorsConfig) -> CorsLayer {
    if !cors_config.enabled {
        return CorsLayer::new();
    }

    let mut cors = CorsLayer::new();

    if cors_config.allowed_origins.contains(&"*".to_string()) {
        cors = cors.allow_origin(Any);
    } else {
        for origin in &cors_config.allowed_origins {
            if let Ok(origin) = origin.parse::<http::header::HeaderValue>() {
                cors = cors.allow_origin(origin);
            }
        }
    }

    cors = cors.allow_methods(Any).allow_headers(Any);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(max_age);
    }

    cors
}
