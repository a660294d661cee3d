//! # Per-path Circuit Breaker
//!
//! Generalizes a provider-keyed circuit breaker to the control plane's path
//! keying (DIRECT / MEDIATED), and adds externally invokable
//! `force_open`/`reset` operations for the emergency shutdown manager and
//! the optimizer's rollback path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

use crate::config::CircuitBreakerConfig;
use crate::model::CircuitState;

struct PathBreaker {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_calls_in_flight: AtomicU32,
    config: CircuitBreakerConfig,
}

impl PathBreaker {
    fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            half_open_calls_in_flight: AtomicU32::new(0),
            config,
        }
    }

    /// Transition OPEN -> HALF_OPEN once the recovery timeout elapses. Must
    /// be called before every admission check.
    fn refresh(&mut self) {
        if self.state == CircuitState::Open {
            if let Some(opened_at) = self.opened_at {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    self.state = CircuitState::HalfOpen;
                    self.half_open_calls_in_flight.store(0, Ordering::SeqCst);
                }
            }
        }
    }
}

/// Registry of per-path circuit breakers. One process-wide instance is
/// injected into the router rather than reached via a global (spec §9).
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, PathBreaker>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Arc<Self> {
        Arc::new(Self {
            breakers: RwLock::new(HashMap::new()),
            default_config,
        })
    }

    /// Whether a call on `path` may proceed right now.
    pub async fn can_execute(&self, path: &str) -> bool {
        let mut breakers = self.breakers.write().await;
        let breaker = breakers
            .entry(path.to_string())
            .or_insert_with(|| PathBreaker::new(self.default_config.clone()));
        breaker.refresh();

        match breaker.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                let in_flight = breaker.half_open_calls_in_flight.fetch_add(1, Ordering::SeqCst);
                if in_flight < breaker.config.half_open_max_calls {
                    true
                } else {
                    breaker.half_open_calls_in_flight.fetch_sub(1, Ordering::SeqCst);
                    false
                }
            }
        }
    }

    pub async fn record_success(&self, path: &str) {
        let mut breakers = self.breakers.write().await;
        let breaker = breakers
            .entry(path.to_string())
            .or_insert_with(|| PathBreaker::new(self.default_config.clone()));
        breaker.refresh();
        breaker.consecutive_failures = 0;
        breaker.state = CircuitState::Closed;
        breaker.opened_at = None;
    }

    pub async fn record_failure(&self, path: &str) {
        let mut breakers = self.breakers.write().await;
        let breaker = breakers
            .entry(path.to_string())
            .or_insert_with(|| PathBreaker::new(self.default_config.clone()));
        breaker.refresh();
        breaker.consecutive_failures += 1;

        let should_open = match breaker.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => breaker.consecutive_failures >= breaker.config.failure_threshold,
            CircuitState::Open => true,
        };

        if should_open {
            breaker.state = CircuitState::Open;
            breaker.opened_at = Some(Instant::now());
        }
    }

    pub async fn force_open(&self, path: &str) {
        let mut breakers = self.breakers.write().await;
        let breaker = breakers
            .entry(path.to_string())
            .or_insert_with(|| PathBreaker::new(self.default_config.clone()));
        breaker.state = CircuitState::Open;
        breaker.opened_at = Some(Instant::now());
    }

    pub async fn reset(&self, path: &str) {
        let mut breakers = self.breakers.write().await;
        let breaker = breakers
            .entry(path.to_string())
            .or_insert_with(|| PathBreaker::new(self.default_config.clone()));
        breaker.state = CircuitState::Closed;
        breaker.consecutive_failures = 0;
        breaker.opened_at = None;
        breaker.half_open_calls_in_flight.store(0, Ordering::SeqCst);
    }

    pub async fn state(&self, path: &str) -> CircuitState {
        let mut breakers = self.breakers.write().await;
        let breaker = breakers
            .entry(path.to_string())
            .or_insert_with(|| PathBreaker::new(self.default_config.clone()));
        breaker.refresh();
        breaker.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 5,
            recovery_timeout: std::time::Duration::from_millis(50),
            half_open_max_calls: 1,
        }
    }

    #[tokio::test]
    async fn opens_after_five_consecutive_failures() {
        let registry = CircuitBreakerRegistry::new(fast_config());
        for _ in 0..4 {
            registry.record_failure("direct").await;
        }
        assert_eq!(registry.state("direct").await, CircuitState::Closed);
        registry.record_failure("direct").await;
        assert_eq!(registry.state("direct").await, CircuitState::Open);
    }

    #[tokio::test]
    async fn half_opens_after_recovery_timeout_then_closes_on_success() {
        let registry = CircuitBreakerRegistry::new(fast_config());
        for _ in 0..5 {
            registry.record_failure("direct").await;
        }
        assert_eq!(registry.state("direct").await, CircuitState::Open);

        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        assert_eq!(registry.state("direct").await, CircuitState::HalfOpen);

        registry.record_success("direct").await;
        assert_eq!(registry.state("direct").await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let registry = CircuitBreakerRegistry::new(fast_config());
        for _ in 0..5 {
            registry.record_failure("direct").await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        assert_eq!(registry.state("direct").await, CircuitState::HalfOpen);
        registry.record_failure("direct").await;
        assert_eq!(registry.state("direct").await, CircuitState::Open);
    }

    #[tokio::test]
    async fn force_open_and_reset() {
        let registry = CircuitBreakerRegistry::new(fast_config());
        registry.force_open("mediated").await;
        assert_eq!(registry.state("mediated").await, CircuitState::Open);
        registry.reset("mediated").await;
        assert_eq!(registry.state("mediated").await, CircuitState::Closed);
    }
}
