//! # Latency Monitor
//!
//! Rolling-window percentile tracker per [`OperationType`]: a bounded
//! `VecDeque` guarded by a short-held `RwLock`, append-on-write,
//! snapshot-on-read.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tokio::sync::RwLock;

use crate::config::LatencyConfig;
use crate::model::{now_millis, Alert, AlertSeverity, LatencyMetric, OperationType};

struct OperationWindow {
    samples: VecDeque<LatencyMetric>,
}

impl OperationWindow {
    fn new() -> Self {
        Self { samples: VecDeque::new() }
    }

    fn push(&mut self, metric: LatencyMetric, cap: usize, window_ms: u64) {
        self.samples.push_back(metric);
        while self.samples.len() > cap {
            self.samples.pop_front();
        }
        let cutoff = now_millis().saturating_sub(window_ms);
        while self.samples.front().map(|m| m.timestamp < cutoff).unwrap_or(false) {
            self.samples.pop_front();
        }
    }
}

/// `P95(L) == sort(L)[ceil(|L| * 0.95) - 1]`, and analogously for any
/// percentile in `(0, 1]`.
pub fn percentile(values: &[u64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let rank = ((sorted.len() as f64) * pct).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted[index] as f64
}

pub struct LatencyMonitor {
    config: LatencyConfig,
    windows: RwLock<HashMap<OperationType, OperationWindow>>,
    starts: Mutex<HashMap<String, (OperationType, u64)>>,
}

impl LatencyMonitor {
    pub fn new(config: LatencyConfig) -> Self {
        Self {
            config,
            windows: RwLock::new(HashMap::new()),
            starts: Mutex::new(HashMap::new()),
        }
    }

    pub fn record_request_start(&self, request_id: &str, operation: OperationType) {
        self.starts
            .lock()
            .unwrap()
            .insert(request_id.to_string(), (operation, now_millis()));
    }

    /// Appends the completed sample synchronously: by the time this call
    /// returns, the sample is visible to the next periodic alert check.
    pub async fn record_request_complete(
        &self,
        request_id: &str,
        provider: Option<String>,
        model: Option<String>,
        cache_hit: Option<bool>,
        token_count: Option<u64>,
        cost: Option<f64>,
    ) -> Option<u64> {
        let (operation, start) = self.starts.lock().unwrap().remove(request_id)?;
        let latency_ms = now_millis().saturating_sub(start);

        let metric = LatencyMetric {
            request_id: request_id.to_string(),
            operation,
            latency_ms,
            timestamp: now_millis(),
            provider,
            model,
            cache_hit,
            token_count,
            cost,
        };

        let mut windows = self.windows.write().await;
        windows
            .entry(operation)
            .or_insert_with(OperationWindow::new)
            .push(metric, self.config.max_metrics, self.config.time_window.as_millis() as u64);

        Some(latency_ms)
    }

    pub async fn p95_latency(&self, operation: OperationType) -> f64 {
        let windows = self.windows.read().await;
        let values: Vec<u64> = windows
            .get(&operation)
            .map(|w| w.samples.iter().map(|m| m.latency_ms).collect())
            .unwrap_or_default();
        percentile(&values, 0.95)
    }

    pub async fn cache_hit_rate(&self, operation: OperationType) -> f64 {
        let windows = self.windows.read().await;
        let Some(window) = windows.get(&operation) else {
            return 100.0;
        };
        let total = window.samples.len();
        if total == 0 {
            return 100.0;
        }
        let hits = window.samples.iter().filter(|m| m.cache_hit == Some(true)).count();
        (hits as f64 / total as f64) * 100.0
    }

    fn target_ms(&self, operation: OperationType) -> u64 {
        match operation {
            OperationType::Generation => self.config.generation_target_ms,
            OperationType::Rag => self.config.rag_target_ms,
            OperationType::Cached => self.config.cached_target_ms,
        }
    }

    /// Periodic alert check (spec default: every 60s). Emits a `p95_breach`
    /// alert per breaching operation and a `cache_miss_rate` alert if the
    /// cache hit rate for GENERATION drops below target.
    pub async fn check_targets(&self) -> Vec<Alert> {
        let mut alerts = Vec::new();
        for operation in [OperationType::Generation, OperationType::Rag, OperationType::Cached] {
            let target = self.target_ms(operation) as f64;
            let p95 = self.p95_latency(operation).await;
            if p95 > target {
                let severity = if p95 <= target * 1.5 {
                    AlertSeverity::Warning
                } else {
                    AlertSeverity::Critical
                };
                alerts.push(Alert {
                    alert_type: "p95_breach".to_string(),
                    severity,
                    scope: format!("{:?}", operation),
                    current_value: p95,
                    threshold: target,
                    timestamp: now_millis(),
                    recommendations: vec![],
                });
            }
        }

        let cache_rate = self.cache_hit_rate(OperationType::Generation).await;
        if cache_rate < self.config.cache_hit_target_pct {
            let severity = if cache_rate < 60.0 {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            };
            alerts.push(Alert {
                alert_type: "cache_miss_rate".to_string(),
                severity,
                scope: "GENERATION".to_string(),
                current_value: cache_rate,
                threshold: self.config.cache_hit_target_pct,
                timestamp: now_millis(),
                recommendations: vec![],
            });
        }

        alerts
    }

    /// Fires synchronously (not on the periodic cadence) whenever a single
    /// sample's latency exceeds 2x target.
    pub fn spike_alert(&self, operation: OperationType, latency_ms: u64) -> Option<Alert> {
        let target = self.target_ms(operation) as f64;
        if latency_ms as f64 > target * 2.0 {
            Some(Alert {
                alert_type: "latency_spike".to_string(),
                severity: AlertSeverity::Critical,
                scope: format!("{:?}", operation),
                current_value: latency_ms as f64,
                threshold: target,
                timestamp: now_millis(),
                recommendations: vec![],
            })
        } else {
            None
        }
    }

    /// Performance grade A-F from `0.7 * targetScore + 0.3 * cacheScore`.
    pub async fn performance_grade(&self) -> char {
        let mut targets_met = 0;
        for operation in [OperationType::Generation, OperationType::Rag, OperationType::Cached] {
            if self.p95_latency(operation).await <= self.target_ms(operation) as f64 {
                targets_met += 1;
            }
        }
        let target_score = targets_met as f64 / 3.0 * 100.0;
        let cache_score = self.cache_hit_rate(OperationType::Generation).await;
        let overall = 0.7 * target_score + 0.3 * cache_score;

        match overall as u32 {
            90..=u32::MAX => 'A',
            80..=89 => 'B',
            70..=79 => 'C',
            60..=69 => 'D',
            _ => 'F',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_matches_definition() {
        let values: Vec<u64> = (1..=20).collect();
        let p95 = percentile(&values, 0.95);
        let mut sorted = values.clone();
        sorted.sort_unstable();
        let expected_index = ((sorted.len() as f64) * 0.95).ceil() as usize - 1;
        assert_eq!(p95, sorted[expected_index] as f64);
    }

    #[tokio::test]
    async fn p95_breach_triggers_warning() {
        let monitor = LatencyMonitor::new(LatencyConfig::default());
        for i in 0..100u64 {
            let id = format!("req-{i}");
            monitor.record_request_start(&id, OperationType::Generation);
            // simulate latencies in [1600, 2600]
            monitor.starts.lock().unwrap().get_mut(&id).unwrap().1 =
                now_millis().saturating_sub(1600 + (i * 10));
            monitor
                .record_request_complete(&id, None, None, Some(false), None, None)
                .await;
        }
        let alerts = monitor.check_targets().await;
        assert!(alerts.iter().any(|a| a.alert_type == "p95_breach" && a.scope == "Generation"));
    }

    #[tokio::test]
    async fn cache_hit_rate_is_100_with_no_samples() {
        let monitor = LatencyMonitor::new(LatencyConfig::default());
        assert_eq!(monitor.cache_hit_rate(OperationType::Cached).await, 100.0);
    }
}
