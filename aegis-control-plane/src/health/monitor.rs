//! # Intelligent Health Monitor
//!
//! Produces a [`HealthMetrics`] snapshot on a fixed cadence from resource
//! samples, auto-resolution success rate, and response-time/throughput
//! readings, generalizing a per-provider health-monitoring loop into a
//! whole-system score.

use std::collections::VecDeque;

use tokio::sync::RwLock;

use crate::config::HealthConfig;
use crate::external::{ResourceProbe, ResourceSample};
use crate::model::{
    now_millis, Anomaly, AnomalyCategory, HealthMetrics, PerformanceSnapshot, Recommendation,
    RecommendationCategory, Severity,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Improving,
    Stable,
    Degrading,
}

#[derive(Debug, Clone, Copy)]
pub struct Trend {
    pub direction: TrendDirection,
    pub confidence: f64,
}

/// Least-squares slope and R^2 over `(index, value)` pairs.
fn least_squares(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    if values.len() < 2 {
        return (0.0, 0.0);
    }
    let xs: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = values.iter().sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for (x, y) in xs.iter().zip(values.iter()) {
        num += (x - x_mean) * (y - y_mean);
        den += (x - x_mean).powi(2);
    }
    let slope = if den == 0.0 { 0.0 } else { num / den };
    let intercept = y_mean - slope * x_mean;

    let mut ss_tot = 0.0;
    let mut ss_res = 0.0;
    for (x, y) in xs.iter().zip(values.iter()) {
        let predicted = slope * x + intercept;
        ss_res += (y - predicted).powi(2);
        ss_tot += (y - y_mean).powi(2);
    }
    let r2 = if ss_tot == 0.0 { 1.0 } else { 1.0 - ss_res / ss_tot };
    (slope, r2.max(0.0))
}

/// Trend direction from a raw slope; `invert` flips the semantics for
/// metrics where a falling value is an improvement (response time, error
/// rate).
pub fn trend(values: &[f64], invert: bool) -> Trend {
    let (slope, r2) = least_squares(values);
    let direction = if slope.abs() < 0.01 {
        TrendDirection::Stable
    } else if (slope > 0.0) != invert {
        TrendDirection::Improving
    } else {
        TrendDirection::Degrading
    };
    Trend { direction, confidence: r2 }
}

pub struct HealthSnapshotInputs {
    pub resources: ResourceSample,
    pub auto_resolution_success_rate: f64,
    pub response_time_ms: f64,
    pub throughput: f64,
}

pub struct IntelligentHealthMonitor<P: ResourceProbe> {
    config: HealthConfig,
    probe: P,
    history: RwLock<VecDeque<HealthMetrics>>,
}

impl<P: ResourceProbe> IntelligentHealthMonitor<P> {
    pub fn new(config: HealthConfig, probe: P) -> Self {
        Self {
            config,
            probe,
            history: RwLock::new(VecDeque::new()),
        }
    }

    pub async fn sample(&self, auto_resolution_success_rate: f64, response_time_ms: f64, throughput: f64) -> HealthMetrics {
        let resources = self.probe.sample().await;
        let inputs = HealthSnapshotInputs {
            resources,
            auto_resolution_success_rate,
            response_time_ms,
            throughput,
        };
        let metrics = self.build_metrics(inputs);

        let mut history = self.history.write().await;
        history.push_back(metrics.clone());
        while history.len() > self.config.history {
            history.pop_front();
        }
        metrics
    }

    fn build_metrics(&self, inputs: HealthSnapshotInputs) -> HealthMetrics {
        let cpu = inputs.resources.cpu_pct;
        let mem = inputs.resources.mem_pct;
        let disk = inputs.resources.disk_pct;

        let resource_monitor =
            (((1.0 - cpu / 100.0) + (1.0 - mem / 100.0) + (1.0 - disk / 100.0)) / 3.0).clamp(0.0, 1.0);
        let auto_resolution = (inputs.auto_resolution_success_rate / 100.0).clamp(0.0, 1.0);

        let mut component_health = std::collections::HashMap::new();
        component_health.insert("resourceMonitor".to_string(), resource_monitor);
        component_health.insert("autoResolution".to_string(), auto_resolution);
        component_health.insert("latencyMonitor".to_string(), 1.0);
        component_health.insert("routingPerformance".to_string(), 1.0);

        let error_rate = 1.0 - auto_resolution;
        let resource_utilization = (cpu + mem) / 200.0;
        let perf_score = (1.0 - error_rate)
            * (1.0 - resource_utilization.min(1.0))
            * (inputs.throughput / 500.0).min(1.0);

        let avg_component = component_health.values().sum::<f64>() / component_health.len() as f64;
        let overall = (0.6 * avg_component + 0.4 * perf_score).clamp(0.0, 1.0);

        let performance = PerformanceSnapshot {
            response_time_ms: inputs.response_time_ms,
            throughput: inputs.throughput,
            error_rate,
            resource_utilization,
        };

        let anomalies = self.detect_anomalies(cpu, mem, error_rate, inputs.response_time_ms, inputs.throughput);
        let recommendations = self.recommend(&anomalies, &component_health);

        HealthMetrics {
            timestamp: now_millis(),
            overall,
            component_health,
            performance,
            anomalies,
            recommendations,
        }
    }

    fn detect_anomalies(
        &self,
        cpu: f64,
        mem: f64,
        error_rate: f64,
        response_time_ms: f64,
        throughput: f64,
    ) -> Vec<Anomaly> {
        let c = &self.config;
        let mut anomalies = Vec::new();

        if cpu > c.cpu_crit_pct {
            anomalies.push(self.anomaly(AnomalyCategory::Cpu, Severity::Critical, cpu, c.cpu_crit_pct, "CPU utilization critical"));
        } else if cpu > c.cpu_warn_pct {
            anomalies.push(self.anomaly(AnomalyCategory::Cpu, Severity::High, cpu, c.cpu_warn_pct, "CPU utilization elevated"));
        }

        if mem > c.mem_crit_pct {
            anomalies.push(self.anomaly(AnomalyCategory::Memory, Severity::Critical, mem, c.mem_crit_pct, "Memory utilization critical"));
        } else if mem > c.mem_warn_pct {
            anomalies.push(self.anomaly(AnomalyCategory::Memory, Severity::High, mem, c.mem_warn_pct, "Memory utilization elevated"));
        }

        if error_rate > c.error_rate_crit {
            anomalies.push(self.anomaly(AnomalyCategory::ErrorRate, Severity::Critical, error_rate, c.error_rate_crit, "Error rate critical"));
        } else if error_rate > c.error_rate_warn {
            anomalies.push(self.anomaly(AnomalyCategory::ErrorRate, Severity::High, error_rate, c.error_rate_warn, "Error rate elevated"));
        }

        if response_time_ms > c.response_time_crit_ms as f64 {
            anomalies.push(self.anomaly(AnomalyCategory::ResponseTime, Severity::Critical, response_time_ms, c.response_time_crit_ms as f64, "Response time critical"));
        } else if response_time_ms > c.response_time_warn_ms as f64 {
            anomalies.push(self.anomaly(AnomalyCategory::ResponseTime, Severity::Medium, response_time_ms, c.response_time_warn_ms as f64, "Response time elevated"));
        }

        if throughput < c.throughput_low {
            anomalies.push(self.anomaly(AnomalyCategory::Throughput, Severity::Low, throughput, c.throughput_low, "Throughput below expected floor"));
        }

        anomalies
    }

    fn anomaly(&self, category: AnomalyCategory, severity: Severity, current_value: f64, threshold: f64, description: &str) -> Anomaly {
        Anomaly {
            id: uuid::Uuid::new_v4().to_string(),
            category,
            severity,
            description: description.to_string(),
            current_value,
            threshold,
            timestamp: now_millis(),
        }
    }

    fn recommend(&self, anomalies: &[Anomaly], component_health: &std::collections::HashMap<String, f64>) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        for anomaly in anomalies {
            let (category, priority, description, effort, improvement) = match anomaly.category {
                AnomalyCategory::Cpu => (RecommendationCategory::Scaling, 8, "Scale out compute capacity", "medium", 20.0),
                AnomalyCategory::Memory => (RecommendationCategory::Scaling, 8, "Increase memory allocation or reduce cache size", "medium", 15.0),
                AnomalyCategory::ErrorRate => (RecommendationCategory::Optimization, 10, "Critical issue resolution: investigate elevated error rate", "high", 30.0),
                AnomalyCategory::ResponseTime => (RecommendationCategory::Optimization, 7, "Tune routing and caching to reduce response time", "medium", 18.0),
                AnomalyCategory::Throughput => (RecommendationCategory::Maintenance, 4, "Review downstream capacity constraints", "low", 10.0),
            };
            let priority = if anomaly.severity == Severity::Critical { 10 } else { priority };
            recommendations.push(Recommendation {
                id: uuid::Uuid::new_v4().to_string(),
                category,
                priority,
                description: description.to_string(),
                implementation_effort: effort.to_string(),
                expected_improvement_pct: improvement,
            });
        }

        if let Some(&auto_resolution) = component_health.get("autoResolution") {
            if auto_resolution < 0.9 {
                recommendations.push(Recommendation {
                    id: uuid::Uuid::new_v4().to_string(),
                    category: RecommendationCategory::Security,
                    priority: 6,
                    description: "Review auto-resolution failure patterns".to_string(),
                    implementation_effort: "medium".to_string(),
                    expected_improvement_pct: 12.0,
                });
            }
        }

        recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
        recommendations
    }

    /// Least-squares trend for `overall` health over the last `window` samples.
    pub async fn overall_trend(&self, window: usize) -> Trend {
        let history = self.history.read().await;
        let values: Vec<f64> = history.iter().rev().take(window).map(|m| m.overall).rev().collect();
        trend(&values, false)
    }

    pub async fn latest(&self) -> Option<HealthMetrics> {
        self.history.read().await.back().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::StaticResourceProbe;

    fn healthy_probe() -> StaticResourceProbe {
        StaticResourceProbe(ResourceSample { cpu_pct: 20.0, mem_pct: 30.0, disk_pct: 10.0 })
    }

    #[tokio::test]
    async fn healthy_system_scores_above_threshold() {
        let monitor = IntelligentHealthMonitor::new(HealthConfig::default(), healthy_probe());
        let metrics = monitor.sample(100.0, 200.0, 600.0).await;
        assert!(metrics.overall >= 0.0 && metrics.overall <= 1.0);
        assert!(metrics.overall >= 0.95, "overall = {}", metrics.overall);
        assert!(metrics.anomalies.is_empty());
    }

    #[tokio::test]
    async fn cpu_spike_raises_critical_anomaly() {
        let probe = StaticResourceProbe(ResourceSample { cpu_pct: 97.0, mem_pct: 30.0, disk_pct: 10.0 });
        let monitor = IntelligentHealthMonitor::new(HealthConfig::default(), probe);
        let metrics = monitor.sample(100.0, 200.0, 600.0).await;
        assert!(metrics.anomalies.iter().any(|a| a.category == AnomalyCategory::Cpu && a.severity == Severity::Critical));
        assert!(metrics.recommendations.iter().any(|r| r.priority == 10));
    }

    #[test]
    fn stable_trend_for_flat_series() {
        let t = trend(&[0.8, 0.8, 0.8, 0.8], false);
        assert_eq!(t.direction, TrendDirection::Stable);
    }

    #[test]
    fn degrading_trend_for_falling_series() {
        let t = trend(&[0.9, 0.8, 0.7, 0.6], false);
        assert_eq!(t.direction, TrendDirection::Degrading);
    }

    #[test]
    fn response_time_trend_is_inverted() {
        // Response time is rising, which is bad — invert=true should report Degrading.
        let t = trend(&[100.0, 200.0, 300.0, 400.0], true);
        assert_eq!(t.direction, TrendDirection::Degrading);
    }
}
