//! # External Interfaces
//!
//! The core never talks to a concrete web UI, cloud notification manager, or
//! deployment-automation system directly — it depends on these traits, and a
//! root "wiring" value (see [`crate::wiring`]) supplies concrete
//! implementations at process startup. Keeping the boundary as traits is
//! what lets the safety-and-steering subsystem be exercised as a library,
//! independent of the HTTP process in `main.rs`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::model::{Request as CoreRequest, Response as CoreResponse, SafetyVerdict};
use crate::safety::guardrails::Source;

/// Invokes a concrete model provider. Implemented by an adapter over
/// `Arc<dyn aegis_core::providers::Provider>` so any of the SDK's existing
/// provider integrations satisfy this for free.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn invoke(&self, request: &CoreRequest, deadline: Duration) -> anyhow::Result<CoreResponse>;
}

/// An external content-moderation service (e.g. a managed safety API).
#[async_trait]
pub trait ContentPolicySink: Send + Sync {
    async fn check(
        &self,
        text: &str,
        source: Source,
        domain: &str,
        request_id: &str,
    ) -> anyhow::Result<SafetyVerdict>;
}

/// A sink that always allows; used where no external content policy is
/// configured and by unit tests that only exercise the local detectors.
pub struct NoopContentPolicySink;

#[async_trait]
impl ContentPolicySink for NoopContentPolicySink {
    async fn check(
        &self,
        _text: &str,
        _source: Source,
        _domain: &str,
        _request_id: &str,
    ) -> anyhow::Result<SafetyVerdict> {
        Ok(SafetyVerdict::allow())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationChannel {
    Chat,
    Email,
    Pager,
}

/// Fan-out destination for operator-facing alerts (shutdown triggers,
/// critical anomalies). Failures are logged, never propagated.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, channel: NotificationChannel, subject: &str, body: &str);
}

pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn publish(&self, channel: NotificationChannel, subject: &str, body: &str) {
        tracing::warn!(?channel, subject, body, "notification");
    }
}

/// Observability export sink (metric namespace/name/value/unit/dimensions).
#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn publish(
        &self,
        namespace: &str,
        metric_name: &str,
        value: f64,
        unit: &str,
        dimensions: &HashMap<String, String>,
    );
}

pub struct LoggingMetricSink;

#[async_trait]
impl MetricSink for LoggingMetricSink {
    async fn publish(
        &self,
        namespace: &str,
        metric_name: &str,
        value: f64,
        unit: &str,
        dimensions: &HashMap<String, String>,
    ) {
        tracing::debug!(namespace, metric_name, value, unit, ?dimensions, "metric");
    }
}

/// Read-mostly feature flag store; writes serialize behind the
/// implementation's own lock, reads are lock-free against a snapshot.
#[async_trait]
pub trait FeatureFlagStore: Send + Sync {
    fn get(&self, name: &str) -> bool;
    fn set(&self, name: &str, value: bool);
}

/// Host resource sampling for the Intelligent Health Monitor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceSample {
    pub cpu_pct: f64,
    pub mem_pct: f64,
    pub disk_pct: f64,
}

#[async_trait]
pub trait ResourceProbe: Send + Sync {
    async fn sample(&self) -> ResourceSample;
}

/// A probe returning a fixed sample; useful in tests and as a default when no
/// real host telemetry source is wired up.
pub struct StaticResourceProbe(pub ResourceSample);

#[async_trait]
impl ResourceProbe for StaticResourceProbe {
    async fn sample(&self) -> ResourceSample {
        self.0
    }
}

/// Abstract scaling interface used by the Optimization Orchestrator's
/// scaling recommendations. Out of core scope; specified for completeness.
#[async_trait]
pub trait DeploymentControl: Send + Sync {
    async fn scale_out(&self, component: &str, by: u32) -> anyhow::Result<()>;
    async fn scale_in(&self, component: &str, by: u32) -> anyhow::Result<()>;
}
