//! # Activation Monitor
//!
//! Records every feature-flag / routing-rule mutation as an
//! [`ActivationOperation`] and reports success-rate and duration percentiles
//! over a rolling time window, using the same ring-buffer-over-`RwLock`
//! pattern as the rest of the telemetry subsystem.

use std::collections::VecDeque;

use tokio::sync::RwLock;

use crate::model::{now_millis, ActivationOperation, Alert, AlertSeverity};
use crate::telemetry::latency_monitor::percentile;

/// Parses a bare time-window string using only `h` (hours), `d` (days), or
/// `m` (minutes) suffixes, deliberately narrower than a full
/// seconds/milliseconds unit set (see DESIGN.md).
pub fn parse_window(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty time window".to_string());
    }
    let (digits, unit) = s.split_at(s.len() - 1);
    let value: u64 = digits.parse().map_err(|_| format!("invalid time window: {s}"))?;
    let ms_per_unit = match unit {
        "h" => 3_600_000,
        "d" => 86_400_000,
        "m" => 60_000,
        other => return Err(format!("unsupported time window unit: {other}")),
    };
    Ok(value * ms_per_unit)
}

pub struct ActivationMonitor {
    retention_ms: u64,
    operations: RwLock<VecDeque<ActivationOperation>>,
}

impl ActivationMonitor {
    pub fn new(retention_days: u64) -> Self {
        Self {
            retention_ms: retention_days * 86_400_000,
            operations: RwLock::new(VecDeque::new()),
        }
    }

    pub async fn record(&self, operation: ActivationOperation) {
        let mut operations = self.operations.write().await;
        operations.push_back(operation);
        let cutoff = now_millis().saturating_sub(self.retention_ms);
        while operations.front().map(|op| op.timestamp < cutoff).unwrap_or(false) {
            operations.pop_front();
        }
    }

    async fn window(&self, since_ms: u64) -> Vec<ActivationOperation> {
        let operations = self.operations.read().await;
        let cutoff = now_millis().saturating_sub(since_ms);
        operations.iter().filter(|op| op.timestamp >= cutoff).cloned().collect()
    }

    pub async fn success_rate(&self, since_ms: u64) -> f64 {
        let ops = self.window(since_ms).await;
        if ops.is_empty() {
            return 100.0;
        }
        let succeeded = ops.iter().filter(|op| op.success).count();
        (succeeded as f64 / ops.len() as f64) * 100.0
    }

    pub async fn duration_percentiles(&self, since_ms: u64) -> (f64, f64, f64) {
        let ops = self.window(since_ms).await;
        let durations: Vec<u64> = ops.iter().map(|op| op.duration_ms).collect();
        (percentile(&durations, 0.5), percentile(&durations, 0.95), percentile(&durations, 0.99))
    }

    pub async fn affected_flags(&self, since_ms: u64) -> Vec<String> {
        let ops = self.window(since_ms).await;
        let mut flags: Vec<String> = ops
            .iter()
            .filter(|op| !op.success)
            .map(|op| op.flag_name.clone())
            .collect();
        flags.sort();
        flags.dedup();
        flags
    }

    /// Checks the last hour's success rate against the configured
    /// thresholds, requiring at least 5 operations to avoid noise from a
    /// cold start.
    pub async fn check_alert(&self) -> Option<Alert> {
        const ONE_HOUR_MS: u64 = 3_600_000;
        let ops = self.window(ONE_HOUR_MS).await;
        if ops.len() < 5 {
            return None;
        }
        let rate = self.success_rate(ONE_HOUR_MS).await;
        let affected = self.affected_flags(ONE_HOUR_MS).await;

        if rate < 99.0 {
            let severity = if rate < 95.0 { AlertSeverity::Critical } else { AlertSeverity::Warning };
            let threshold = if rate < 95.0 { 95.0 } else { 99.0 };
            return Some(Alert {
                alert_type: "activation_failure_rate".to_string(),
                severity,
                scope: affected.join(","),
                current_value: rate,
                threshold,
                timestamp: now_millis(),
                recommendations: vec!["review recent flag/rule changes".to_string()],
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(flag: &str, success: bool, duration_ms: u64) -> ActivationOperation {
        ActivationOperation {
            flag_name: flag.to_string(),
            operation: "toggle".to_string(),
            timestamp: now_millis(),
            success,
            duration_ms,
            error: None,
            environment: "production".to_string(),
        }
    }

    #[test]
    fn parse_window_accepts_hours_days_minutes() {
        assert_eq!(parse_window("2h").unwrap(), 2 * 3_600_000);
        assert_eq!(parse_window("1d").unwrap(), 86_400_000);
        assert_eq!(parse_window("30m").unwrap(), 30 * 60_000);
    }

    #[test]
    fn parse_window_rejects_seconds() {
        assert!(parse_window("30s").is_err());
    }

    #[tokio::test]
    async fn no_alert_below_five_operations() {
        let monitor = ActivationMonitor::new(30);
        for _ in 0..3 {
            monitor.record(op("beta_rollout", false, 10)).await;
        }
        assert!(monitor.check_alert().await.is_none());
    }

    #[tokio::test]
    async fn critical_alert_when_success_rate_below_95() {
        let monitor = ActivationMonitor::new(30);
        for _ in 0..10 {
            monitor.record(op("beta_rollout", false, 10)).await;
        }
        let alert = monitor.check_alert().await.unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert!(alert.scope.contains("beta_rollout"));
    }
}
