//! # Core Data Model
//!
//! The provider-agnostic request/response envelope and the shared value
//! types that flow between the safety, routing, and telemetry subsystems.
//! These are deliberately distinct from [`aegis_core::models::ChatRequest`]
//! and friends, which are the wire format for a single provider call; the
//! types here are what the control plane itself reasons about.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A provider-agnostic request entering the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub prompt: String,
    pub context: RequestContext,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub domain: String,
    pub intent: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// A provider-agnostic response leaving the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub content: String,
    pub provider: String,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub tokens: Option<u64>,
    pub latency_ms: Option<u64>,
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationType {
    Pii,
    Toxicity,
    HateSpeech,
    Violence,
    Sexual,
    PromptInjection,
    Custom,
    SystemError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub confidence: f64,
    pub details: String,
    pub span: Option<Span>,
}

/// The outcome of running the safety pipeline over one direction (input or
/// output) of a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub allowed: bool,
    pub confidence: f64,
    pub violations: Vec<Violation>,
    pub modified: Option<String>,
    pub processing_ms: u64,
    pub applied: Vec<String>,
}

impl SafetyVerdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            confidence: 1.0,
            violations: Vec::new(),
            modified: None,
            processing_ms: 0,
            applied: Vec::new(),
        }
    }

    /// Combine two verdicts computed over the same text (e.g. local detectors
    /// and an external content-policy sink): conjunction of `allowed`, min of
    /// confidence, concatenation of violations, and `other`'s `modified`
    /// string takes priority over `self`'s when both redacted the text.
    pub fn merge(self, other: Self) -> Self {
        let modified = other.modified.or(self.modified);
        let mut violations = self.violations;
        violations.extend(other.violations);
        let mut applied = self.applied;
        applied.extend(other.applied);
        Self {
            allowed: self.allowed && other.allowed,
            confidence: self.confidence.min(other.confidence),
            violations,
            modified,
            processing_ms: self.processing_ms + other.processing_ms,
            applied,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteType {
    Direct,
    Mediated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    Generation,
    Rag,
    Cached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub operation_type: OperationType,
    pub priority: Priority,
    pub latency_requirement_ms: u64,
    pub primary: RouteType,
    pub fallback: RouteType,
    pub health_check_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    pub route: RouteType,
    pub reason: String,
}

/// Aggregate performance metrics for one routing path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathMetrics {
    pub path: String,
    pub request_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub average_latency_ms: f64,
    pub success_rate: f64,
    pub last_updated: u64,
}

impl PathMetrics {
    pub fn empty(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            request_count: 0,
            success_count: 0,
            failure_count: 0,
            p50_ms: 0.0,
            p95_ms: 0.0,
            p99_ms: 0.0,
            average_latency_ms: 0.0,
            success_rate: 100.0,
            last_updated: now_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyMetric {
    pub request_id: String,
    pub operation: OperationType,
    pub latency_ms: u64,
    pub timestamp: u64,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub cache_hit: Option<bool>,
    pub token_count: Option<u64>,
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub scope: String,
    pub current_value: f64,
    pub threshold: f64,
    pub timestamp: u64,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub response_time_ms: f64,
    pub throughput: f64,
    pub error_rate: f64,
    pub resource_utilization: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyCategory {
    Cpu,
    Memory,
    ErrorRate,
    ResponseTime,
    Throughput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: String,
    pub category: AnomalyCategory,
    pub severity: Severity,
    pub description: String,
    pub current_value: f64,
    pub threshold: f64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationCategory {
    Optimization,
    Scaling,
    Maintenance,
    Security,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub category: RecommendationCategory,
    pub priority: u8,
    pub description: String,
    pub implementation_effort: String,
    pub expected_improvement_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub timestamp: u64,
    pub overall: f64,
    pub component_health: HashMap<String, f64>,
    pub performance: PerformanceSnapshot,
    pub anomalies: Vec<Anomaly>,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub id: String,
    pub strategy: String,
    pub applied_recommendations: Vec<String>,
    pub measured_improvement_pct: Option<f64>,
    pub rolled_back: bool,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationOperation {
    pub flag_name: String,
    pub operation: String,
    pub timestamp: u64,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub environment: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistributionStats {
    pub mean: f64,
    pub std_dev: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftMetrics {
    pub model: String,
    pub baseline: DistributionStats,
    pub current: DistributionStats,
    pub data_drift_score: f64,
    pub prompt_drift_score: f64,
    pub latency_regression_score: f64,
    pub accuracy_regression_score: f64,
    pub error_rate_regression_score: f64,
    pub quality_score: f64,
    pub toxicity_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownScope {
    All,
    Direct,
    Mediated,
    IntelligentRouter,
    SupportMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownReason {
    SecurityIncident,
    ComplianceViolation,
    SystemFailure,
    PerformanceDegradation,
    CostOverrun,
    ManualIntervention,
    CircuitBreakerTriggered,
    HealthCheckFailure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownEvent {
    pub id: String,
    pub scope: ShutdownScope,
    pub reason: ShutdownReason,
    pub triggered_by: String,
    pub timestamp: u64,
    pub affected_components: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ShutdownEvent {
    pub fn new(
        scope: ShutdownScope,
        reason: ShutdownReason,
        triggered_by: impl Into<String>,
        affected_components: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scope,
            reason,
            triggered_by: triggered_by.into(),
            timestamp: now_millis(),
            affected_components,
            metadata: HashMap::new(),
        }
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_merge_is_conjunction_of_allowed() {
        let a = SafetyVerdict::allow();
        let mut b = SafetyVerdict::allow();
        b.allowed = false;
        let merged = a.merge(b);
        assert!(!merged.allowed);
    }

    #[test]
    fn verdict_merge_prefers_other_modified() {
        let mut a = SafetyVerdict::allow();
        a.modified = Some("a".to_string());
        let mut b = SafetyVerdict::allow();
        b.modified = Some("b".to_string());
        let merged = a.merge(b);
        assert_eq!(merged.modified.as_deref(), Some("b"));
    }

    #[test]
    fn verdict_merge_falls_back_to_self_modified_when_other_has_none() {
        let mut a = SafetyVerdict::allow();
        a.modified = Some("a".to_string());
        let b = SafetyVerdict::allow();
        let merged = a.merge(b);
        assert_eq!(merged.modified.as_deref(), Some("a"));
    }
}
