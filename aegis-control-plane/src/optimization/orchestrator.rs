//! # System Optimization Orchestrator
//!
//! Top-level lifecycle controller: decides whether the current health
//! snapshot warrants an optimization pass, dispatches approved
//! recommendations to the appropriate subordinate, and measures impact.
//! Generalizes a single-provider health-monitoring loop into one that
//! drives the health monitor and routing optimizer together.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::OrchestratorConfig;
use crate::external::{DeploymentControl, ResourceProbe};
use crate::health::IntelligentHealthMonitor;
use crate::model::{now_millis, HealthMetrics, RecommendationCategory};
use crate::optimization::routing_optimizer::RoutingEfficiencyOptimizer;

#[derive(Debug, Clone)]
pub struct OptimizationImpact {
    pub health_improvement: f64,
    pub performance_gain: f64,
    pub issues_resolved: usize,
}

pub struct SystemOptimizationOrchestrator<P: ResourceProbe, D: DeploymentControl> {
    config: OrchestratorConfig,
    health: Arc<IntelligentHealthMonitor<P>>,
    routing_optimizer: Arc<RoutingEfficiencyOptimizer>,
    deployment: D,
    impacts: RwLock<Vec<OptimizationImpact>>,
}

impl<P: ResourceProbe, D: DeploymentControl> SystemOptimizationOrchestrator<P, D> {
    pub fn new(
        config: OrchestratorConfig,
        health: Arc<IntelligentHealthMonitor<P>>,
        routing_optimizer: Arc<RoutingEfficiencyOptimizer>,
        deployment: D,
    ) -> Self {
        Self {
            config,
            health,
            routing_optimizer,
            deployment,
            impacts: RwLock::new(Vec::new()),
        }
    }

    fn should_optimize(&self, metrics: &HealthMetrics) -> bool {
        let critical_anomalies = metrics
            .anomalies
            .iter()
            .filter(|a| a.severity == crate::model::Severity::Critical)
            .count();
        let high_priority_recs = metrics.recommendations.iter().filter(|r| r.priority >= 8).count();

        metrics.overall < self.config.health_score_threshold
            || critical_anomalies >= self.config.critical_anomaly_threshold
            || high_priority_recs >= self.config.high_priority_recommendation_threshold
    }

    /// Runs one decide-and-act pass. Returns `None` if no optimization was
    /// warranted this tick.
    pub async fn tick(&self, auto_resolution_success_rate: f64, response_time_ms: f64, throughput: f64) -> Option<OptimizationImpact> {
        let before = self.health.sample(auto_resolution_success_rate, response_time_ms, throughput).await;
        if !self.should_optimize(&before) {
            return None;
        }

        for rec in &before.recommendations {
            if !self.config.auto_execute_enabled {
                continue;
            }
            if rec.priority > self.config.max_priority_level {
                continue;
            }
            let category_name = category_name(rec.category);
            if self.config.requires_approval.iter().any(|c| c == category_name) {
                continue;
            }
            self.dispatch(rec.category).await;
        }

        // Re-measure after giving the dispatched actions a moment to land.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let after = self.health.sample(auto_resolution_success_rate, response_time_ms, throughput).await;

        let health_improvement = after.overall - before.overall;
        let d_response = normalize_delta(before.performance.response_time_ms, after.performance.response_time_ms, false);
        let d_throughput = normalize_delta(before.performance.throughput, after.performance.throughput, true);
        let d_error_rate = normalize_delta(before.performance.error_rate, after.performance.error_rate, false);
        let performance_gain = 0.4 * d_response + 0.4 * d_throughput + 0.2 * d_error_rate;
        let issues_resolved = before.anomalies.len().saturating_sub(after.anomalies.len());

        let impact = OptimizationImpact {
            health_improvement,
            performance_gain,
            issues_resolved,
        };

        let mut impacts = self.impacts.write().await;
        impacts.push(impact.clone());
        let len = impacts.len();
        if len > 100 {
            impacts.drain(0..len - 100);
        }

        Some(impact)
    }

    async fn dispatch(&self, category: RecommendationCategory) {
        match category {
            RecommendationCategory::Optimization => {
                let _ = self.routing_optimizer.run_cycle().await;
            }
            RecommendationCategory::Scaling => {
                let _ = self.deployment.scale_out("aegis-control-plane", 1).await;
            }
            RecommendationCategory::Maintenance => {
                tracing::info!("maintenance recommendation dispatched, no-op subordinate at this tick");
            }
            RecommendationCategory::Security => {
                tracing::warn!("security recommendation dispatched, deferring to operator review");
            }
        }
    }

    pub async fn recent_impacts(&self) -> Vec<OptimizationImpact> {
        self.impacts.read().await.clone()
    }
}

fn category_name(category: RecommendationCategory) -> &'static str {
    match category {
        RecommendationCategory::Optimization => "optimization",
        RecommendationCategory::Scaling => "scaling",
        RecommendationCategory::Maintenance => "maintenance",
        RecommendationCategory::Security => "security",
    }
}

fn normalize_delta(before: f64, after: f64, higher_is_better: bool) -> f64 {
    if before == 0.0 {
        return 0.0;
    }
    let delta = if higher_is_better { after - before } else { before - after };
    (delta / before).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CircuitBreakerConfig, HealthConfig, OptimizerConfig};
    use crate::external::{ResourceSample, StaticResourceProbe};
    use crate::model::{OperationType, Priority, RouteType, RoutingRule};
    use crate::routing::{CircuitBreakerRegistry, IntelligentRouter};
    use crate::telemetry::RoutingPerformanceMonitor;

    struct NullDeployment;
    #[async_trait::async_trait]
    impl DeploymentControl for NullDeployment {
        async fn scale_out(&self, _component: &str, _by: u32) -> anyhow::Result<()> {
            Ok(())
        }
        async fn scale_in(&self, _component: &str, _by: u32) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn unhealthy_probe() -> StaticResourceProbe {
        StaticResourceProbe(ResourceSample { cpu_pct: 97.0, mem_pct: 96.0, disk_pct: 50.0 })
    }

    #[tokio::test]
    async fn optimizes_when_health_below_threshold() {
        let health = Arc::new(IntelligentHealthMonitor::new(HealthConfig::default(), unhealthy_probe()));

        let performance = Arc::new(RoutingPerformanceMonitor::new(10_000));
        let router = Arc::new(IntelligentRouter::new(
            vec![RoutingRule {
                operation_type: OperationType::Generation,
                priority: Priority::High,
                latency_requirement_ms: 1500,
                primary: RouteType::Direct,
                fallback: RouteType::Mediated,
                health_check_required: true,
            }],
            CircuitBreakerRegistry::new(CircuitBreakerConfig::default()),
            performance.clone(),
        ));
        let routing_optimizer = Arc::new(RoutingEfficiencyOptimizer::new(
            OptimizerConfig::default(),
            router,
            performance,
            0.01,
        ));

        let orchestrator = SystemOptimizationOrchestrator::new(
            OrchestratorConfig::default(),
            health,
            routing_optimizer,
            NullDeployment,
        );

        let impact = orchestrator.tick(50.0, 6000.0, 50.0).await;
        assert!(impact.is_some());
    }
}
