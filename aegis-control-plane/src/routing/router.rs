//! # Intelligent Router
//!
//! Selects DIRECT or MEDIATED per request from the configured
//! [`RoutingRule`] set. The active rule set is held behind an
//! [`arc_swap::ArcSwap`] so updates (from the optimizer) take effect
//! atomically for subsequent decisions while in-flight decisions keep using
//! the rule set they read — no lock is held across the decision.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::model::{OperationType, RouteDecision, RouteType, RoutingRule};
use crate::routing::circuit_breaker::CircuitBreakerRegistry;
use crate::telemetry::routing_performance_monitor::RoutingPerformanceMonitor;

pub struct IntelligentRouter {
    rules: ArcSwap<Vec<RoutingRule>>,
    circuit_breakers: Arc<CircuitBreakerRegistry>,
    performance: Arc<RoutingPerformanceMonitor>,
}

pub fn path_name(route: RouteType) -> &'static str {
    match route {
        RouteType::Direct => "direct",
        RouteType::Mediated => "mediated",
    }
}

impl IntelligentRouter {
    pub fn new(
        rules: Vec<RoutingRule>,
        circuit_breakers: Arc<CircuitBreakerRegistry>,
        performance: Arc<RoutingPerformanceMonitor>,
    ) -> Self {
        Self {
            rules: ArcSwap::from_pointee(rules),
            circuit_breakers,
            performance,
        }
    }

    /// Atomically replace the active rule set. Safe to call concurrently
    /// with in-flight `route()` calls.
    pub fn set_rules(&self, rules: Vec<RoutingRule>) {
        self.rules.store(Arc::new(rules));
    }

    pub fn rules(&self) -> Arc<Vec<RoutingRule>> {
        self.rules.load_full()
    }

    pub async fn route(&self, operation: OperationType) -> Result<RouteDecision, String> {
        let rules = self.rules.load();
        let rule = rules
            .iter()
            .find(|r| r.operation_type == operation)
            .ok_or_else(|| format!("no routing rule for operation {:?}", operation))?;

        let primary_path = path_name(rule.primary);
        let fallback_path = path_name(rule.fallback);

        let primary_healthy = self.path_is_healthy(primary_path, rule.latency_requirement_ms).await;
        if primary_healthy {
            return Ok(RouteDecision {
                route: rule.primary,
                reason: "primary path healthy".to_string(),
            });
        }

        let fallback_healthy = self.path_is_healthy(fallback_path, rule.latency_requirement_ms).await;
        if fallback_healthy {
            return Ok(RouteDecision {
                route: rule.fallback,
                reason: "primary unhealthy, fallback healthy".to_string(),
            });
        }

        Err(format!(
            "both primary ({primary_path}) and fallback ({fallback_path}) paths are unhealthy for operation {operation:?}"
        ))
    }

    async fn path_is_healthy(&self, path: &str, latency_requirement_ms: u64) -> bool {
        if !self.circuit_breakers.can_execute(path).await {
            return false;
        }

        let metrics = self.performance.path_metrics(path).await;
        if metrics.request_count == 0 {
            return true;
        }
        metrics.p95_ms <= latency_requirement_ms as f64 * 1.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use crate::model::Priority;

    fn rule(op: OperationType) -> RoutingRule {
        RoutingRule {
            operation_type: op,
            priority: Priority::High,
            latency_requirement_ms: 1500,
            primary: RouteType::Direct,
            fallback: RouteType::Mediated,
            health_check_required: true,
        }
    }

    async fn router() -> IntelligentRouter {
        IntelligentRouter::new(
            vec![rule(OperationType::Generation)],
            CircuitBreakerRegistry::new(CircuitBreakerConfig::default()),
            Arc::new(RoutingPerformanceMonitor::new(10_000)),
        )
    }

    #[tokio::test]
    async fn routes_to_primary_when_healthy() {
        let r = router().await;
        let decision = r.route(OperationType::Generation).await.unwrap();
        assert_eq!(decision.route, RouteType::Direct);
    }

    #[tokio::test]
    async fn falls_back_when_primary_circuit_open() {
        let r = router().await;
        r.circuit_breakers.force_open("direct").await;
        let decision = r.route(OperationType::Generation).await.unwrap();
        assert_eq!(decision.route, RouteType::Mediated);
    }

    #[tokio::test]
    async fn errors_when_both_paths_unhealthy() {
        let r = router().await;
        r.circuit_breakers.force_open("direct").await;
        r.circuit_breakers.force_open("mediated").await;
        assert!(r.route(OperationType::Generation).await.is_err());
    }

    #[tokio::test]
    async fn rule_set_swap_is_atomic() {
        let r = router().await;
        r.set_rules(vec![RoutingRule { fallback: RouteType::Direct, ..rule(OperationType::Generation) }]);
        assert_eq!(r.rules().len(), 1);
    }
}
