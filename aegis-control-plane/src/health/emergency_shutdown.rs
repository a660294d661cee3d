//! # Emergency Shutdown Manager
//!
//! Trips automatically on sustained error rate / latency / cost / failure
//! thresholds, force-opens the affected circuit breakers, disables feature
//! flags, fans out notifications, and optionally schedules a recovery probe.
//! Generalizes a single circuit breaker's trip/reset pair from one provider
//! to a whole shutdown scope.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::ShutdownConfig;
use crate::external::{NotificationChannel, NotificationSink};
use crate::feature_flags::InMemoryFeatureFlagStore;
use crate::model::{ShutdownEvent, ShutdownReason, ShutdownScope};
use crate::routing::CircuitBreakerRegistry;

/// Metrics sampled by `check_automatic_triggers`, mirroring the thresholds
/// in the shutdown config.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShutdownMetrics {
    pub error_rate: f64,
    pub latency_ms: u64,
    pub cost_euro_per_hour: f64,
    pub consecutive_failures: u32,
}

fn scope_paths(scope: ShutdownScope) -> &'static [&'static str] {
    match scope {
        ShutdownScope::All => &["direct", "mediated"],
        ShutdownScope::Direct => &["direct"],
        ShutdownScope::Mediated => &["mediated"],
        ShutdownScope::IntelligentRouter => &["direct", "mediated"],
        ShutdownScope::SupportMode => &[],
    }
}

fn scope_flags(scope: ShutdownScope) -> &'static [&'static str] {
    match scope {
        ShutdownScope::All => &["direct_path", "mediated_path"],
        ShutdownScope::Direct => &["direct_path"],
        ShutdownScope::Mediated => &["mediated_path"],
        ShutdownScope::IntelligentRouter => &["direct_path", "mediated_path"],
        ShutdownScope::SupportMode => &["support_mode"],
    }
}

pub struct EmergencyShutdownManager<N: NotificationSink> {
    config: ShutdownConfig,
    circuit_breakers: Arc<CircuitBreakerRegistry>,
    flags: Arc<InMemoryFeatureFlagStore>,
    notifications: N,
    is_shutdown: AtomicBool,
    recovery_attempts: AtomicU32,
    events: RwLock<Vec<ShutdownEvent>>,
}

impl<N: NotificationSink> EmergencyShutdownManager<N> {
    pub fn new(
        config: ShutdownConfig,
        circuit_breakers: Arc<CircuitBreakerRegistry>,
        flags: Arc<InMemoryFeatureFlagStore>,
        notifications: N,
    ) -> Self {
        Self {
            config,
            circuit_breakers,
            flags,
            notifications,
            is_shutdown: AtomicBool::new(false),
            recovery_attempts: AtomicU32::new(0),
            events: RwLock::new(Vec::new()),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }

    pub async fn trigger(
        &self,
        scope: ShutdownScope,
        reason: ShutdownReason,
        triggered_by: &str,
    ) -> ShutdownEvent {
        let event = ShutdownEvent::new(
            scope,
            reason,
            triggered_by,
            scope_paths(scope).iter().map(|s| s.to_string()).collect(),
        );

        self.is_shutdown.store(true, Ordering::SeqCst);

        for flag in scope_flags(scope) {
            self.flags.set(flag, false);
        }
        for path in scope_paths(scope) {
            self.circuit_breakers.force_open(path).await;
        }

        self.notifications
            .publish(
                NotificationChannel::Pager,
                &format!("emergency shutdown: {:?}", scope),
                &format!("reason={:?} triggered_by={}", reason, triggered_by),
            )
            .await;

        self.events.write().await.push(event.clone());
        event
    }

    /// Checks sampled metrics against the configured thresholds and triggers
    /// an ALL-scope shutdown for `performance_degradation` if any threshold
    /// is crossed and `auto_shutdown` is enabled.
    pub async fn check_automatic_triggers(&self, metrics: ShutdownMetrics) -> Option<ShutdownEvent> {
        if !self.config.auto_shutdown || self.is_shutdown() {
            return None;
        }

        let breached = metrics.error_rate >= self.config.error_rate_threshold
            || metrics.latency_ms >= self.config.latency_threshold_ms
            || metrics.cost_euro_per_hour >= self.config.cost_euro_per_hour_threshold
            || metrics.consecutive_failures >= self.config.consecutive_failures_threshold;

        if breached {
            Some(self.trigger(ShutdownScope::All, ShutdownReason::PerformanceDegradation, "automatic-threshold-check").await)
        } else {
            None
        }
    }

    /// Probes `metrics` against the same thresholds; recovery succeeds when
    /// all of them are satisfied. Re-enables flags and resets breakers on
    /// success, increments the attempt counter otherwise, and gives up after
    /// `max_recovery_attempts`.
    pub async fn attempt_recovery(&self, scope: ShutdownScope, metrics: ShutdownMetrics) -> bool {
        if !self.is_shutdown() || !self.config.recovery_enabled {
            return false;
        }

        let healthy = metrics.error_rate < self.config.error_rate_threshold
            && metrics.latency_ms < self.config.latency_threshold_ms
            && metrics.cost_euro_per_hour < self.config.cost_euro_per_hour_threshold
            && metrics.consecutive_failures < self.config.consecutive_failures_threshold;

        if healthy {
            for flag in scope_flags(scope) {
                self.flags.set(flag, true);
            }
            for path in scope_paths(scope) {
                self.circuit_breakers.reset(path).await;
            }
            self.is_shutdown.store(false, Ordering::SeqCst);
            self.recovery_attempts.store(0, Ordering::SeqCst);
            true
        } else {
            self.recovery_attempts.fetch_add(1, Ordering::SeqCst);
            false
        }
    }

    pub fn recovery_attempts(&self) -> u32 {
        self.recovery_attempts.load(Ordering::SeqCst)
    }

    pub fn recovery_exhausted(&self) -> bool {
        self.recovery_attempts() >= self.config.max_recovery_attempts
    }

    pub async fn history(&self) -> Vec<ShutdownEvent> {
        self.events.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;

    struct NullSink;
    #[async_trait::async_trait]
    impl NotificationSink for NullSink {
        async fn publish(&self, _channel: NotificationChannel, _subject: &str, _body: &str) {}
    }

    fn manager() -> EmergencyShutdownManager<NullSink> {
        EmergencyShutdownManager::new(
            ShutdownConfig::default(),
            CircuitBreakerRegistry::new(CircuitBreakerConfig::default()),
            Arc::new(InMemoryFeatureFlagStore::new()),
            NullSink,
        )
    }

    #[tokio::test]
    async fn trigger_sets_shutdown_and_opens_breakers() {
        let mgr = manager();
        mgr.trigger(ShutdownScope::All, ShutdownReason::SecurityIncident, "operator").await;
        assert!(mgr.is_shutdown());
        assert!(!mgr.circuit_breakers.can_execute("direct").await);
        assert!(!mgr.flags.get("direct_path"));
    }

    #[tokio::test]
    async fn automatic_trigger_fires_on_error_rate() {
        let mgr = manager();
        let event = mgr
            .check_automatic_triggers(ShutdownMetrics { error_rate: 0.15, ..Default::default() })
            .await;
        assert!(event.is_some());
        assert_eq!(event.unwrap().reason, ShutdownReason::PerformanceDegradation);
    }

    #[tokio::test]
    async fn recovery_succeeds_once_metrics_drop_below_thresholds() {
        let mgr = manager();
        mgr.trigger(ShutdownScope::All, ShutdownReason::SecurityIncident, "operator").await;
        let recovered = mgr.attempt_recovery(ShutdownScope::All, ShutdownMetrics::default()).await;
        assert!(recovered);
        assert!(!mgr.is_shutdown());
    }

    #[tokio::test]
    async fn recovery_fails_and_counts_attempt_while_unhealthy() {
        let mgr = manager();
        mgr.trigger(ShutdownScope::All, ShutdownReason::SecurityIncident, "operator").await;
        let recovered = mgr
            .attempt_recovery(ShutdownScope::All, ShutdownMetrics { error_rate: 0.2, ..Default::default() })
            .await;
        assert!(!recovered);
        assert_eq!(mgr.recovery_attempts(), 1);
    }
}
