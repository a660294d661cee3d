//! # Routing Performance Monitor
//!
//! Per-path success/failure/latency tracking consumed by
//! [`crate::routing::IntelligentRouter`] to decide primary-path health.
//! Generalized from per-provider to per-path health-check bookkeeping,
//! backed by the same bounded ring-buffer-over-`RwLock` shape as
//! [`crate::telemetry::latency_monitor::LatencyMonitor`].

use std::collections::{HashMap, VecDeque};

use tokio::sync::RwLock;

use crate::model::{now_millis, PathMetrics};
use crate::telemetry::latency_monitor::percentile;

struct PathHistory {
    latencies: VecDeque<u64>,
    success_count: u64,
    failure_count: u64,
}

impl PathHistory {
    fn new() -> Self {
        Self {
            latencies: VecDeque::new(),
            success_count: 0,
            failure_count: 0,
        }
    }
}

pub struct RoutingPerformanceMonitor {
    capacity: usize,
    history: RwLock<HashMap<String, PathHistory>>,
}

impl RoutingPerformanceMonitor {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            history: RwLock::new(HashMap::new()),
        }
    }

    pub async fn record_success(&self, path: &str, latency_ms: u64) {
        let mut history = self.history.write().await;
        let entry = history.entry(path.to_string()).or_insert_with(PathHistory::new);
        entry.success_count += 1;
        entry.latencies.push_back(latency_ms);
        while entry.latencies.len() > self.capacity {
            entry.latencies.pop_front();
        }
    }

    pub async fn record_failure(&self, path: &str) {
        let mut history = self.history.write().await;
        let entry = history.entry(path.to_string()).or_insert_with(PathHistory::new);
        entry.failure_count += 1;
    }

    pub async fn path_metrics(&self, path: &str) -> PathMetrics {
        let history = self.history.read().await;
        let Some(entry) = history.get(path) else {
            return PathMetrics::empty(path);
        };

        let values: Vec<u64> = entry.latencies.iter().copied().collect();
        let request_count = entry.success_count + entry.failure_count;
        let average_latency_ms = if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<u64>() as f64 / values.len() as f64
        };
        let success_rate = if request_count == 0 {
            100.0
        } else {
            (entry.success_count as f64 / request_count as f64) * 100.0
        };

        PathMetrics {
            path: path.to_string(),
            request_count,
            success_count: entry.success_count,
            failure_count: entry.failure_count,
            p50_ms: percentile(&values, 0.5),
            p95_ms: percentile(&values, 0.95),
            p99_ms: percentile(&values, 0.99),
            average_latency_ms,
            success_rate,
            last_updated: now_millis(),
        }
    }

    pub async fn all_paths(&self) -> Vec<String> {
        self.history.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_path_reports_full_success_rate() {
        let monitor = RoutingPerformanceMonitor::new(1_000);
        let metrics = monitor.path_metrics("direct").await;
        assert_eq!(metrics.request_count, 0);
        assert_eq!(metrics.success_rate, 100.0);
    }

    #[tokio::test]
    async fn tracks_success_and_failure_counts() {
        let monitor = RoutingPerformanceMonitor::new(1_000);
        monitor.record_success("direct", 100).await;
        monitor.record_success("direct", 200).await;
        monitor.record_failure("direct").await;

        let metrics = monitor.path_metrics("direct").await;
        assert_eq!(metrics.success_count, 2);
        assert_eq!(metrics.failure_count, 1);
        assert_eq!(metrics.request_count, 3);
    }

    #[tokio::test]
    async fn ring_buffer_respects_capacity() {
        let monitor = RoutingPerformanceMonitor::new(3);
        for i in 0..10u64 {
            monitor.record_success("direct", i).await;
        }
        let history = monitor.history.read().await;
        assert_eq!(history.get("direct").unwrap().latencies.len(), 3);
    }
}
