//! # Routing Efficiency Optimizer
//!
//! Periodically analyzes per-path performance, proposes routing-rule
//! adjustments, applies a bounded number of them, and rolls back any whose
//! measured impact falls short after an evaluation window.
//!
//! A literal reading would model each applied change's undo as a boxed
//! closure over the router and circuit-breaker registry. Both of those
//! collaborators expose only async mutators, which a `FnOnce(&T)` cannot
//! call synchronously, so here the rollback is a plain snapshot of the rule
//! set taken immediately before the change — restoring it is exactly the
//! "atomic rule-set swap" the router already performs, just run in reverse.

use std::sync::Arc;
use std::time::Instant;

use crate::config::OptimizerConfig;
use crate::model::{now_millis, OperationType, OptimizationResult, Priority, RouteType, RoutingRule};
use crate::routing::IntelligentRouter;
use crate::telemetry::RoutingPerformanceMonitor;

#[derive(Debug, Clone)]
pub struct RoutePerformanceProfile {
    pub path: String,
    pub average_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub success_rate: f64,
    pub cost_per_request: f64,
    pub reliability: f64,
    pub capacity: f64,
    pub request_count: u64,
}

#[derive(Debug, Clone)]
pub struct OptimizationRecommendation {
    pub kind: &'static str,
    pub priority: Priority,
    pub description: String,
    pub expected_improvement_pct: f64,
}

struct AppliedCycle {
    applied_at: Instant,
    rule_snapshot: Vec<RoutingRule>,
    recommendations: Vec<OptimizationRecommendation>,
    baseline_avg_latency_ms: f64,
    baseline_success_rate: f64,
    baseline_cost: f64,
}

pub struct RoutingEfficiencyOptimizer {
    config: OptimizerConfig,
    router: Arc<IntelligentRouter>,
    performance: Arc<RoutingPerformanceMonitor>,
    base_cost_per_route: f64,
    applied: std::sync::Mutex<Vec<AppliedCycle>>,
    results: std::sync::Mutex<Vec<OptimizationResult>>,
}

impl RoutingEfficiencyOptimizer {
    pub fn new(
        config: OptimizerConfig,
        router: Arc<IntelligentRouter>,
        performance: Arc<RoutingPerformanceMonitor>,
        base_cost_per_route: f64,
    ) -> Self {
        Self {
            config,
            router,
            performance,
            base_cost_per_route,
            applied: std::sync::Mutex::new(Vec::new()),
            results: std::sync::Mutex::new(Vec::new()),
        }
    }

    async fn profile(&self, path: &str) -> RoutePerformanceProfile {
        let metrics = self.performance.path_metrics(path).await;
        let cost_per_request = self.base_cost_per_route * (metrics.average_latency_ms / 1000.0);
        let capacity = (1.0 - metrics.p95_ms / 30_000.0).max(0.1);
        RoutePerformanceProfile {
            path: path.to_string(),
            average_latency_ms: metrics.average_latency_ms,
            p95_latency_ms: metrics.p95_ms,
            success_rate: metrics.success_rate,
            cost_per_request,
            reliability: metrics.success_rate / 100.0,
            capacity,
            request_count: metrics.request_count,
        }
    }

    /// Runs one optimize cycle: refresh, analyze, recommend, apply. Returns
    /// `None` if total request count is below `min_data_points`.
    pub async fn run_cycle(&self) -> Option<Vec<OptimizationRecommendation>> {
        let direct = self.profile("direct").await;
        let mediated = self.profile("mediated").await;

        let total_requests = direct.request_count + mediated.request_count;
        if total_requests < self.config.min_data_points {
            return None;
        }

        let overall_avg_latency = weighted_avg(&[
            (direct.average_latency_ms, direct.request_count),
            (mediated.average_latency_ms, mediated.request_count),
        ]);
        let overall_success_rate = weighted_avg(&[
            (direct.success_rate, direct.request_count),
            (mediated.success_rate, mediated.request_count),
        ]);
        let overall_cost = weighted_avg(&[
            (direct.cost_per_request, direct.request_count),
            (mediated.cost_per_request, mediated.request_count),
        ]);
        let routing_efficiency = (overall_success_rate / 100.0) * 100.0 - (overall_avg_latency / 10_000.0).min(20.0);

        let mut recommendations = Vec::new();

        if overall_avg_latency > 5_000.0 {
            let faster = [&direct, &mediated]
                .into_iter()
                .find(|p| p.average_latency_ms <= overall_avg_latency * 0.8);
            if let Some(p) = faster {
                recommendations.push(OptimizationRecommendation {
                    kind: "rule_adjustment",
                    priority: Priority::High,
                    description: format!("shift traffic toward {} (faster path)", p.path),
                    expected_improvement_pct: 25.0,
                });
            }
        }

        if overall_success_rate < 95.0 {
            recommendations.push(OptimizationRecommendation {
                kind: "circuit_breaker_tightening",
                priority: Priority::Critical,
                description: "tighten circuit-breaker thresholds to fail fast on the unreliable path".to_string(),
                expected_improvement_pct: 15.0,
            });
        }

        if overall_cost > self.base_cost_per_route * 1.2 {
            recommendations.push(OptimizationRecommendation {
                kind: "cost_efficient_strategy",
                priority: Priority::Medium,
                description: "switch default strategy to cost-efficient".to_string(),
                expected_improvement_pct: 30.0,
            });
        }

        if routing_efficiency < 80.0 {
            recommendations.push(OptimizationRecommendation {
                kind: "adaptive_threshold_optimization",
                priority: Priority::High,
                description: "enable adaptive latency thresholds".to_string(),
                expected_improvement_pct: 20.0,
            });
        }

        if recommendations.len() >= 3 && self.config.adaptive {
            recommendations.push(OptimizationRecommendation {
                kind: "strategy_change",
                priority: Priority::Medium,
                description: "switch default routing strategy given compounding signals".to_string(),
                expected_improvement_pct: 18.0,
            });
        }

        let mut to_apply = recommendations.clone();
        to_apply.sort_by(|a, b| b.priority.cmp(&a.priority));
        to_apply.truncate(self.config.max_rule_changes);

        if !to_apply.is_empty() {
            let snapshot = (*self.router.rules()).clone();
            self.apply(&to_apply);
            self.applied.lock().unwrap().push(AppliedCycle {
                applied_at: Instant::now(),
                rule_snapshot: snapshot,
                recommendations: to_apply,
                baseline_avg_latency_ms: overall_avg_latency,
                baseline_success_rate: overall_success_rate,
                baseline_cost: overall_cost,
            });
        }

        Some(recommendations)
    }

    fn apply(&self, recommendations: &[OptimizationRecommendation]) {
        for rec in recommendations {
            if rec.kind == "rule_adjustment" {
                let mut rules = (*self.router.rules()).clone();
                for rule in rules.iter_mut() {
                    if rule.operation_type == OperationType::Generation {
                        rule.primary = RouteType::Direct;
                        rule.fallback = RouteType::Mediated;
                    }
                }
                self.router.set_rules(rules);
            }
        }
    }

    /// Re-evaluates cycles applied at least `evaluation_window` ago, rolling
    /// back any whose measured improvement is below `rollback_threshold_pct`.
    pub async fn evaluate_pending(&self) -> Vec<OptimizationResult> {
        let due: Vec<usize> = {
            let applied = self.applied.lock().unwrap();
            applied
                .iter()
                .enumerate()
                .filter(|(_, c)| c.applied_at.elapsed() >= self.config.evaluation_window)
                .map(|(i, _)| i)
                .collect()
        };

        let mut outcomes = Vec::new();
        for idx in due.into_iter().rev() {
            let cycle = self.applied.lock().unwrap().remove(idx);

            let direct = self.profile("direct").await;
            let mediated = self.profile("mediated").await;
            let after_latency = weighted_avg(&[
                (direct.average_latency_ms, direct.request_count),
                (mediated.average_latency_ms, mediated.request_count),
            ]);
            let after_success = weighted_avg(&[
                (direct.success_rate, direct.request_count),
                (mediated.success_rate, mediated.request_count),
            ]);
            let after_cost = weighted_avg(&[
                (direct.cost_per_request, direct.request_count),
                (mediated.cost_per_request, mediated.request_count),
            ]);

            let latency_improvement = relative_improvement(cycle.baseline_avg_latency_ms, after_latency, false);
            let success_improvement = relative_improvement(cycle.baseline_success_rate, after_success, true);
            let cost_improvement = relative_improvement(cycle.baseline_cost, after_cost, false);

            let overall = 0.4 * latency_improvement + 0.3 * success_improvement + 0.3 * cost_improvement;
            let rolled_back = overall < self.config.rollback_threshold_pct;

            if rolled_back {
                self.router.set_rules(cycle.rule_snapshot);
            }

            let result = OptimizationResult {
                id: uuid::Uuid::new_v4().to_string(),
                strategy: format!("{:?}", self.config.default_strategy),
                applied_recommendations: cycle.recommendations.iter().map(|r| r.description.clone()).collect(),
                measured_improvement_pct: Some(overall),
                rolled_back,
                timestamp: now_millis(),
            };
            self.results.lock().unwrap().push(result.clone());
            outcomes.push(result);
        }

        let mut results = self.results.lock().unwrap();
        let len = results.len();
        if len > 100 {
            results.drain(0..len - 100);
        }

        outcomes
    }

    pub fn recent_results(&self) -> Vec<OptimizationResult> {
        self.results.lock().unwrap().clone()
    }
}

fn weighted_avg(pairs: &[(f64, u64)]) -> f64 {
    let total: u64 = pairs.iter().map(|(_, w)| w).sum();
    if total == 0 {
        return 0.0;
    }
    pairs.iter().map(|(v, w)| v * (*w as f64)).sum::<f64>() / total as f64
}

/// Percentage-point improvement of `after` relative to `before`.
fn relative_improvement(before: f64, after: f64, higher_is_better: bool) -> f64 {
    if before == 0.0 {
        return 0.0;
    }
    let delta = if higher_is_better { after - before } else { before - after };
    (delta / before) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use crate::model::OperationType;
    use crate::routing::CircuitBreakerRegistry;

    fn rule() -> RoutingRule {
        RoutingRule {
            operation_type: OperationType::Generation,
            priority: Priority::High,
            latency_requirement_ms: 1500,
            primary: RouteType::Mediated,
            fallback: RouteType::Direct,
            health_check_required: true,
        }
    }

    async fn seeded_optimizer() -> (RoutingEfficiencyOptimizer, Arc<RoutingPerformanceMonitor>) {
        let performance = Arc::new(RoutingPerformanceMonitor::new(10_000));
        let router = Arc::new(IntelligentRouter::new(
            vec![rule()],
            CircuitBreakerRegistry::new(CircuitBreakerConfig::default()),
            performance.clone(),
        ));

        for _ in 0..1000 {
            performance.record_success("mediated", 10_000).await;
        }
        for _ in 0..1000 {
            performance.record_success("direct", 3_000).await;
        }

        let mut config = OptimizerConfig::default();
        config.min_data_points = 100;
        let optimizer = RoutingEfficiencyOptimizer::new(config, router, performance.clone(), 0.01);
        (optimizer, performance)
    }

    #[tokio::test]
    async fn recommends_shift_to_faster_path() {
        let (optimizer, _performance) = seeded_optimizer().await;
        let recommendations = optimizer.run_cycle().await.unwrap();
        assert!(recommendations.iter().any(|r| r.kind == "rule_adjustment"));
        assert!(recommendations.iter().any(|r| r.expected_improvement_pct >= 15.0));
    }

    #[tokio::test]
    async fn skips_cycle_below_min_data_points() {
        let performance = Arc::new(RoutingPerformanceMonitor::new(10_000));
        let router = Arc::new(IntelligentRouter::new(
            vec![rule()],
            CircuitBreakerRegistry::new(CircuitBreakerConfig::default()),
            performance.clone(),
        ));
        let optimizer = RoutingEfficiencyOptimizer::new(OptimizerConfig::default(), router, performance, 0.01);
        assert!(optimizer.run_cycle().await.is_none());
    }

    #[test]
    fn relative_improvement_positive_when_latency_drops() {
        assert!(relative_improvement(10_000.0, 5_000.0, false) > 0.0);
    }
}
