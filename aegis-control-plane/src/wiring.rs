//! # Root Wiring
//!
//! Process-wide singletons are forbidden in the core (spec §9): every
//! component that needs a collaborator receives it through its constructor.
//! [`Wiring`] is the one place that owns the concrete implementations and
//! assembles the object graph; `main.rs`/`server.rs` build a [`Wiring`] once
//! at startup and pass `Arc<AppState>` into the HTTP layer.

use std::sync::Arc;

use crate::config::Config;
use crate::external::{
    LoggingMetricSink, LoggingNotificationSink, NoopContentPolicySink, StaticResourceProbe,
};
use crate::feature_flags::InMemoryFeatureFlagStore;
use crate::health::{EmergencyShutdownManager, IntelligentHealthMonitor};
use crate::optimization::{RoutingEfficiencyOptimizer, SystemOptimizationOrchestrator};
use crate::pipeline::RequestPipeline;
use crate::providers_adapter::build_provider_set;
use crate::routing::{CircuitBreakerRegistry, IntelligentRouter};
use crate::safety::GuardrailsService;
use crate::telemetry::{ActivationMonitor, DriftMonitor, LatencyMonitor, RoutingPerformanceMonitor};

/// A no-op implementation of [`crate::external::DeploymentControl`], used
/// until a real autoscaler integration is wired in.
pub struct NoopDeploymentControl;

#[async_trait::async_trait]
impl crate::external::DeploymentControl for NoopDeploymentControl {
    async fn scale_out(&self, component: &str, by: u32) -> anyhow::Result<()> {
        tracing::info!(component, by, "scale_out requested (no-op deployment control)");
        Ok(())
    }

    async fn scale_in(&self, component: &str, by: u32) -> anyhow::Result<()> {
        tracing::info!(component, by, "scale_in requested (no-op deployment control)");
        Ok(())
    }
}

/// The fully assembled object graph for one process. Every field is an
/// `Arc` so handlers can cheaply clone what they need out of `AppState`.
pub struct Wiring {
    pub router: Arc<IntelligentRouter>,
    pub circuit_breakers: Arc<CircuitBreakerRegistry>,
    pub routing_performance: Arc<RoutingPerformanceMonitor>,
    pub latency: Arc<LatencyMonitor>,
    pub drift: Arc<DriftMonitor>,
    pub activation: Arc<ActivationMonitor>,
    pub flags: Arc<InMemoryFeatureFlagStore>,
    pub health: Arc<IntelligentHealthMonitor<StaticResourceProbe>>,
    pub shutdown: Arc<EmergencyShutdownManager<LoggingNotificationSink>>,
    pub routing_optimizer: Arc<RoutingEfficiencyOptimizer>,
    pub orchestrator: Arc<SystemOptimizationOrchestrator<StaticResourceProbe, NoopDeploymentControl>>,
    pub metrics_sink: Arc<LoggingMetricSink>,
    pub pipeline: Arc<RequestPipeline<NoopContentPolicySink>>,
}

impl Wiring {
    pub fn assemble(config: &Config) -> anyhow::Result<Self> {
        let routing_performance = Arc::new(RoutingPerformanceMonitor::new(10_000));
        let circuit_breakers = CircuitBreakerRegistry::new(config.circuit_breaker.clone());
        let router = Arc::new(IntelligentRouter::new(
            config.router.rules.iter().cloned().map(Into::into).collect(),
            circuit_breakers.clone(),
            routing_performance.clone(),
        ));

        let latency = Arc::new(LatencyMonitor::new(config.latency.clone()));
        let drift = Arc::new(DriftMonitor::new(crate::telemetry::drift_monitor::DriftThresholds::default()));
        let activation = Arc::new(ActivationMonitor::new(config.activation.retention_days as u64));

        let flags = Arc::new(InMemoryFeatureFlagStore::new());

        let resource_probe = StaticResourceProbe(crate::external::ResourceSample::default());
        let health = Arc::new(IntelligentHealthMonitor::new(config.health.clone(), resource_probe));

        let shutdown = Arc::new(EmergencyShutdownManager::new(
            config.shutdown.clone(),
            circuit_breakers.clone(),
            flags.clone(),
            LoggingNotificationSink,
        ));

        let routing_optimizer = Arc::new(RoutingEfficiencyOptimizer::new(
            config.optimizer.clone(),
            router.clone(),
            routing_performance.clone(),
            0.01,
        ));

        let orchestrator = Arc::new(SystemOptimizationOrchestrator::new(
            config.orchestrator.clone(),
            health.clone(),
            routing_optimizer.clone(),
            NoopDeploymentControl,
        ));

        let providers = build_provider_set(config)?;
        let pipeline = Arc::new(RequestPipeline::new(
            router.clone(),
            GuardrailsService::new(config.safety.clone(), NoopContentPolicySink),
            circuit_breakers.clone(),
            routing_performance.clone(),
            latency.clone(),
            providers,
        ));

        Ok(Self {
            router,
            circuit_breakers,
            routing_performance,
            latency,
            drift,
            activation,
            flags,
            health,
            shutdown,
            routing_optimizer,
            orchestrator,
            metrics_sink: Arc::new(LoggingMetricSink),
            pipeline,
        })
    }
}
