//! # HTTP Handlers
//!
//! Thin axum handlers over the safety-and-steering subsystem: a single
//! `/v1/process` entry point for the request pipeline, `/health` and
//! `/metrics` for operational visibility, and a small `/admin` surface over
//! the router's rule set, the optimizer's recent cycles, and the emergency
//! shutdown manager.

use std::time::Duration;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::CoreError;
use crate::model::{OperationType, Request as CoreRequest, Response as CoreResponse, ShutdownReason, ShutdownScope};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub request: CoreRequest,
    pub operation: OperationType,
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
}

fn default_deadline_ms() -> u64 {
    5_000
}

pub async fn process(
    State(state): State<AppState>,
    Json(body): Json<ProcessRequest>,
) -> Result<Json<CoreResponse>, CoreError> {
    let response = state
        .wiring
        .pipeline
        .process(body.request, body.operation, Duration::from_millis(body.deadline_ms))
        .await?;
    Ok(Json(response))
}

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let paths = state.wiring.routing_performance.all_paths().await;
    let mut total_latency = 0.0;
    let mut total_requests = 0u64;
    for path in &paths {
        let metrics = state.wiring.routing_performance.path_metrics(path).await;
        total_latency += metrics.average_latency_ms * metrics.request_count as f64;
        total_requests += metrics.request_count;
    }
    let avg_response_time = if total_requests > 0 { total_latency / total_requests as f64 } else { 0.0 };
    let throughput = total_requests as f64;

    let auto_resolution_success_rate = state.wiring.activation.success_rate(3_600_000).await;

    let snapshot = state
        .wiring
        .health
        .sample(auto_resolution_success_rate, avg_response_time, throughput)
        .await;

    Json(json!({
        "status": if snapshot.overall >= 0.7 { "healthy" } else { "degraded" },
        "overall": snapshot.overall,
        "component_health": snapshot.component_health,
        "anomalies": snapshot.anomalies,
        "is_shutdown": state.wiring.shutdown.is_shutdown(),
    }))
}

pub async fn metrics(State(state): State<AppState>) -> Json<serde_json::Value> {
    let paths = state.wiring.routing_performance.all_paths().await;
    let mut path_metrics = Vec::new();
    for path in &paths {
        path_metrics.push(state.wiring.routing_performance.path_metrics(path).await);
    }

    let latency_alerts = state.wiring.latency.check_targets().await;
    let grade = state.wiring.latency.performance_grade().await;

    Json(json!({
        "paths": path_metrics,
        "latency_alerts": latency_alerts,
        "performance_grade": grade.to_string(),
        "optimizer_results": state.wiring.routing_optimizer.recent_results(),
        "optimizer_impacts": state.wiring.orchestrator.recent_impacts().await,
    }))
}

pub async fn router_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let rules = state.wiring.router.rules();
    let mut breaker_states = serde_json::Map::new();
    for rule in rules.iter() {
        for route in [rule.primary, rule.fallback] {
            let path = crate::routing::router::path_name(route);
            let state_val = state.wiring.circuit_breakers.state(path).await;
            breaker_states.insert(path.to_string(), json!(format!("{:?}", state_val)));
        }
    }

    Json(json!({
        "rules": rules.as_ref(),
        "circuit_breakers": breaker_states,
    }))
}

pub async fn optimizer_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "recent_results": state.wiring.routing_optimizer.recent_results(),
        "recent_impacts": state.wiring.orchestrator.recent_impacts().await,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ShutdownRequest {
    pub scope: ShutdownScope,
    pub reason: ShutdownReason,
    pub triggered_by: String,
}

#[derive(Debug, Serialize)]
pub struct ShutdownResponse {
    pub event: crate::model::ShutdownEvent,
}

pub async fn trigger_shutdown(
    State(state): State<AppState>,
    Json(body): Json<ShutdownRequest>,
) -> Json<ShutdownResponse> {
    let event = state
        .wiring
        .shutdown
        .trigger(body.scope, body.reason, &body.triggered_by)
        .await;
    Json(ShutdownResponse { event })
}
