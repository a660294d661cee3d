//! # Drift Monitor
//!
//! Compares a declared baseline distribution against the current one per
//! model and raises alerts when data, prompt, or regression scores cross
//! thresholds, using the telemetry subsystem's rolling-statistics approach
//! extended with the distribution-distance formulas below.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::model::{
    now_millis, Alert, AlertSeverity, DistributionStats, DriftMetrics,
};

#[derive(Debug, Clone)]
pub struct DriftThresholds {
    pub data_drift_warn: f64,
    pub data_drift_crit: f64,
    pub prompt_drift_warn: f64,
    pub prompt_drift_crit: f64,
    pub latency_regression_warn: f64,
    pub latency_regression_crit: f64,
    pub accuracy_regression_warn: f64,
    pub accuracy_regression_crit: f64,
    pub error_rate_regression_warn: f64,
    pub error_rate_regression_crit: f64,
    pub quality_warn_below: f64,
    pub quality_crit_below: f64,
    pub toxicity_warn_above: f64,
    pub toxicity_crit_above: f64,
}

impl Default for DriftThresholds {
    fn default() -> Self {
        Self {
            data_drift_warn: 0.3,
            data_drift_crit: 0.5,
            prompt_drift_warn: 0.2,
            prompt_drift_crit: 0.4,
            latency_regression_warn: 0.20,
            latency_regression_crit: 0.50,
            accuracy_regression_warn: 0.10,
            accuracy_regression_crit: 0.20,
            error_rate_regression_warn: 0.10,
            error_rate_regression_crit: 0.20,
            quality_warn_below: 0.8,
            quality_crit_below: 0.7,
            toxicity_warn_above: 0.10,
            toxicity_crit_above: 0.20,
        }
    }
}

/// `regressionScore(current, baseline, higherIsBetter)`.
pub fn regression_score(current: f64, baseline: f64, higher_is_better: bool) -> f64 {
    if baseline == 0.0 {
        return 0.0;
    }
    if higher_is_better {
        (-(current - baseline) / baseline).max(0.0)
    } else {
        ((current - baseline) / baseline).max(0.0)
    }
}

/// `0.4*|mean-base|/base + 0.3*|std-base|/base + 0.3*|p95-base|/base`,
/// applied against mean/std/p95 independently (each term's "base" is the
/// matching baseline component).
fn distribution_drift_score(current: &DistributionStats, baseline: &DistributionStats) -> f64 {
    let mean_term = relative_abs_diff(current.mean, baseline.mean);
    let std_term = relative_abs_diff(current.std_dev, baseline.std_dev);
    let p95_term = relative_abs_diff(current.p95, baseline.p95);
    0.4 * mean_term + 0.3 * std_term + 0.3 * p95_term
}

fn relative_abs_diff(current: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        return 0.0;
    }
    ((current - baseline) / baseline).abs()
}

pub struct DriftMonitor {
    thresholds: DriftThresholds,
    baselines: RwLock<HashMap<String, DistributionStats>>,
}

impl DriftMonitor {
    pub fn new(thresholds: DriftThresholds) -> Self {
        Self {
            thresholds,
            baselines: RwLock::new(HashMap::new()),
        }
    }

    pub async fn set_baseline(&self, model: &str, baseline: DistributionStats) {
        self.baselines.write().await.insert(model.to_string(), baseline);
    }

    /// Evaluates `current` against the declared baseline for `model`. `None`
    /// if no baseline has been declared.
    pub async fn evaluate(
        &self,
        model: &str,
        current: DistributionStats,
        latency_current: f64,
        latency_baseline: f64,
        accuracy_current: f64,
        accuracy_baseline: f64,
        error_rate_current: f64,
        error_rate_baseline: f64,
        toxicity_score: f64,
    ) -> Option<(DriftMetrics, Vec<Alert>)> {
        let baselines = self.baselines.read().await;
        let baseline = baselines.get(model)?.clone();
        drop(baselines);

        let data_drift_score = distribution_drift_score(&current, &baseline);
        let prompt_drift_score = data_drift_score;

        let latency_regression_score =
            regression_score(latency_current, latency_baseline, false);
        let accuracy_regression_score =
            regression_score(accuracy_current, accuracy_baseline, true);
        let error_rate_regression_score =
            regression_score(error_rate_current, error_rate_baseline, false);

        let quality_score = (1.0
            - (accuracy_regression_score + error_rate_regression_score) / 2.0)
            .max(0.0);

        let metrics = DriftMetrics {
            model: model.to_string(),
            baseline,
            current,
            data_drift_score,
            prompt_drift_score,
            latency_regression_score,
            accuracy_regression_score,
            error_rate_regression_score,
            quality_score,
            toxicity_score,
        };

        let alerts = self.alerts_for(&metrics);
        Some((metrics, alerts))
    }

    fn alerts_for(&self, metrics: &DriftMetrics) -> Vec<Alert> {
        let t = &self.thresholds;
        let mut alerts = Vec::new();

        self.push_if_above(&mut alerts, "data_drift", metrics.data_drift_score, t.data_drift_warn, t.data_drift_crit, &metrics.model, &["investigate upstream data distribution", "consider retraining"]);
        self.push_if_above(&mut alerts, "prompt_drift", metrics.prompt_drift_score, t.prompt_drift_warn, t.prompt_drift_crit, &metrics.model, &["review recent prompt template changes"]);
        self.push_if_above(&mut alerts, "latency_regression", metrics.latency_regression_score, t.latency_regression_warn, t.latency_regression_crit, &metrics.model, &["roll back recent deployment", "scale out capacity"]);
        self.push_if_above(&mut alerts, "accuracy_regression", metrics.accuracy_regression_score, t.accuracy_regression_warn, t.accuracy_regression_crit, &metrics.model, &["roll back recent model version"]);
        self.push_if_above(&mut alerts, "error_rate_regression", metrics.error_rate_regression_score, t.error_rate_regression_warn, t.error_rate_regression_crit, &metrics.model, &["roll back recent deployment"]);

        if metrics.quality_score < t.quality_crit_below {
            alerts.push(self.alert("quality_score", AlertSeverity::Critical, metrics.quality_score, t.quality_crit_below, &metrics.model, &["roll back", "retrain"]));
        } else if metrics.quality_score < t.quality_warn_below {
            alerts.push(self.alert("quality_score", AlertSeverity::Warning, metrics.quality_score, t.quality_warn_below, &metrics.model, &["monitor closely"]));
        }

        if metrics.toxicity_score > t.toxicity_crit_above {
            alerts.push(self.alert("toxicity_score", AlertSeverity::Critical, metrics.toxicity_score, t.toxicity_crit_above, &metrics.model, &["tighten guardrail thresholds", "roll back"]));
        } else if metrics.toxicity_score > t.toxicity_warn_above {
            alerts.push(self.alert("toxicity_score", AlertSeverity::Warning, metrics.toxicity_score, t.toxicity_warn_above, &metrics.model, &["review recent outputs"]));
        }

        alerts
    }

    #[allow(clippy::too_many_arguments)]
    fn push_if_above(
        &self,
        alerts: &mut Vec<Alert>,
        alert_type: &str,
        value: f64,
        warn: f64,
        crit: f64,
        model: &str,
        recommendations: &[&str],
    ) {
        if value > crit {
            alerts.push(self.alert(alert_type, AlertSeverity::Critical, value, crit, model, recommendations));
        } else if value > warn {
            alerts.push(self.alert(alert_type, AlertSeverity::Warning, value, warn, model, recommendations));
        }
    }

    fn alert(
        &self,
        alert_type: &str,
        severity: AlertSeverity,
        value: f64,
        threshold: f64,
        model: &str,
        recommendations: &[&str],
    ) -> Alert {
        Alert {
            alert_type: alert_type.to_string(),
            severity,
            scope: model.to_string(),
            current_value: value,
            threshold,
            timestamp: now_millis(),
            recommendations: recommendations.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(mean: f64, std_dev: f64, p95: f64) -> DistributionStats {
        DistributionStats { mean, std_dev, p50: mean, p95, p99: p95 * 1.1 }
    }

    #[test]
    fn regression_score_is_zero_when_improved() {
        assert_eq!(regression_score(50.0, 100.0, false), 0.0);
        assert_eq!(regression_score(150.0, 100.0, true), 0.0);
    }

    #[test]
    fn regression_score_is_positive_when_worse() {
        assert!(regression_score(150.0, 100.0, false) > 0.0);
        assert!(regression_score(50.0, 100.0, true) > 0.0);
    }

    #[tokio::test]
    async fn no_baseline_returns_none() {
        let monitor = DriftMonitor::new(DriftThresholds::default());
        assert!(monitor
            .evaluate("gpt-4", stats(1.0, 1.0, 1.0), 100.0, 100.0, 0.9, 0.9, 0.01, 0.01, 0.0)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn drifted_distribution_raises_alert() {
        let monitor = DriftMonitor::new(DriftThresholds::default());
        monitor.set_baseline("gpt-4", stats(100.0, 10.0, 120.0)).await;

        let (metrics, alerts) = monitor
            .evaluate(
                "gpt-4",
                stats(180.0, 10.0, 120.0),
                500.0,
                500.0,
                0.9,
                0.9,
                0.01,
                0.01,
                0.0,
            )
            .await
            .unwrap();

        assert!(metrics.data_drift_score > 0.3);
        assert!(alerts.iter().any(|a| a.alert_type == "data_drift"));
    }
}
