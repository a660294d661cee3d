//! # Request Pipeline
//!
//! Wires the per-request flow together: pre-check → route → invoke →
//! post-check → record, replacing a plain load-balancer selection with the
//! [`IntelligentRouter`] and wrapping the provider call in the
//! [`ActiveGuardrailsManager`].

use std::sync::Arc;
use std::time::Duration;

use crate::error::CoreError;
use crate::external::{ContentPolicySink, ProviderClient};
use crate::model::{OperationType, Response};
use crate::routing::{router::path_name, CircuitBreakerRegistry, IntelligentRouter};
use crate::safety::{ActiveGuardrailsManager, GuardedOutcome, GuardrailsService, Stage};
use crate::telemetry::{LatencyMonitor, RoutingPerformanceMonitor};

pub struct RequestPipeline<S: ContentPolicySink> {
    router: Arc<IntelligentRouter>,
    guardrails: Arc<ActiveGuardrailsManager<S>>,
    circuit_breakers: Arc<CircuitBreakerRegistry>,
    routing_performance: Arc<RoutingPerformanceMonitor>,
    latency: Arc<LatencyMonitor>,
    providers: ProviderSet,
}

/// The two execution-path providers a request may be routed to.
pub struct ProviderSet {
    pub direct: Arc<dyn ProviderClient>,
    pub mediated: Arc<dyn ProviderClient>,
}

impl<S: ContentPolicySink> RequestPipeline<S> {
    pub fn new(
        router: Arc<IntelligentRouter>,
        guardrails_service: GuardrailsService<S>,
        circuit_breakers: Arc<CircuitBreakerRegistry>,
        routing_performance: Arc<RoutingPerformanceMonitor>,
        latency: Arc<LatencyMonitor>,
        providers: ProviderSet,
    ) -> Self {
        Self {
            router,
            guardrails: Arc::new(ActiveGuardrailsManager::new(guardrails_service)),
            circuit_breakers,
            routing_performance,
            latency,
            providers,
        }
    }

    pub async fn process(
        &self,
        request: crate::model::Request,
        operation: OperationType,
        deadline: Duration,
    ) -> Result<Response, CoreError> {
        let request_id = request
            .metadata
            .get("request_id")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        self.latency.record_request_start(&request_id, operation);
        let started_at = std::time::Instant::now();

        let decision = self
            .router
            .route(operation)
            .await
            .map_err(|message| CoreError::ProviderUnavailable { message })?;

        let path = path_name(decision.route);
        let provider = match decision.route {
            crate::model::RouteType::Direct => self.providers.direct.clone(),
            crate::model::RouteType::Mediated => self.providers.mediated.clone(),
        };

        let outcome = self.guardrails.process(&request, provider, deadline).await;
        let elapsed_ms = started_at.elapsed().as_millis() as u64;

        let result = match outcome {
            GuardedOutcome::Allowed { response, bedrock_delegation_requested, .. } => {
                if bedrock_delegation_requested {
                    tracing::info!(path, "bedrock usage policy requested provider delegation");
                }
                self.circuit_breakers.record_success(path).await;
                self.routing_performance.record_success(path, elapsed_ms).await;
                Ok(response)
            }
            GuardedOutcome::Blocked { verdict, stage, bedrock_delegation_requested } => {
                if bedrock_delegation_requested {
                    tracing::info!(path, "bedrock usage policy requested provider delegation");
                }
                self.circuit_breakers.record_failure(path).await;
                self.routing_performance.record_failure(path).await;
                if stage == Stage::PostCheck && verdict.violations.iter().any(|v| v.violation_type == crate::model::ViolationType::SystemError) {
                    Err(CoreError::ProviderUnavailable {
                        message: "provider invocation failed during guarded call".to_string(),
                    })
                } else {
                    let categories: Vec<String> = verdict
                        .violations
                        .iter()
                        .map(|v| format!("{:?}", v.violation_type))
                        .collect();
                    Err(CoreError::PolicyBlocked {
                        message: format!("request blocked at {:?}: {}", stage, categories.join(",")),
                    })
                }
            }
        };

        self.latency
            .record_request_complete(&request_id, Some(path.to_string()), None, None, None, None)
            .await;

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CircuitBreakerConfig, LatencyConfig};
    use crate::external::NoopContentPolicySink;
    use crate::model::{Request, RequestContext};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct EchoProvider;

    #[async_trait]
    impl ProviderClient for EchoProvider {
        async fn invoke(&self, request: &Request, _deadline: Duration) -> anyhow::Result<Response> {
            Ok(Response {
                content: request.prompt.clone(),
                provider: "echo".to_string(),
                metadata: crate::model::ResponseMetadata::default(),
            })
        }
    }

    fn request(prompt: &str) -> Request {
        let mut metadata = HashMap::new();
        metadata.insert("request_id".to_string(), serde_json::json!("req-1"));
        Request {
            prompt: prompt.to_string(),
            context: RequestContext { domain: "culinary".to_string(), intent: "qa".to_string(), user_id: None },
            metadata,
        }
    }

    #[tokio::test]
    async fn clean_request_completes_successfully() {
        let performance = Arc::new(RoutingPerformanceMonitor::new(1_000));
        let circuit_breakers = CircuitBreakerRegistry::new(CircuitBreakerConfig::default());
        let router = Arc::new(IntelligentRouter::new(
            vec![crate::model::RoutingRule {
                operation_type: OperationType::Generation,
                priority: crate::model::Priority::High,
                latency_requirement_ms: 1500,
                primary: crate::model::RouteType::Direct,
                fallback: crate::model::RouteType::Mediated,
                health_check_required: true,
            }],
            circuit_breakers.clone(),
            performance.clone(),
        ));

        let guardrails = GuardrailsService::new(crate::config::SafetyConfig::default(), NoopContentPolicySink);
        let pipeline = RequestPipeline::new(
            router,
            guardrails,
            circuit_breakers,
            performance,
            Arc::new(LatencyMonitor::new(LatencyConfig::default())),
            ProviderSet { direct: Arc::new(EchoProvider), mediated: Arc::new(EchoProvider) },
        );

        let response = pipeline
            .process(request("tell me about pasta"), OperationType::Generation, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(response.content, "tell me about pasta");
    }

    #[tokio::test]
    async fn pii_request_is_blocked() {
        let performance = Arc::new(RoutingPerformanceMonitor::new(1_000));
        let circuit_breakers = CircuitBreakerRegistry::new(CircuitBreakerConfig::default());
        let router = Arc::new(IntelligentRouter::new(
            vec![crate::model::RoutingRule {
                operation_type: OperationType::Generation,
                priority: crate::model::Priority::High,
                latency_requirement_ms: 1500,
                primary: crate::model::RouteType::Direct,
                fallback: crate::model::RouteType::Mediated,
                health_check_required: true,
            }],
            circuit_breakers.clone(),
            performance.clone(),
        ));

        let guardrails = GuardrailsService::new(crate::config::SafetyConfig::default(), NoopContentPolicySink);
        let pipeline = RequestPipeline::new(
            router,
            guardrails,
            circuit_breakers,
            performance,
            Arc::new(LatencyMonitor::new(LatencyConfig::default())),
            ProviderSet { direct: Arc::new(EchoProvider), mediated: Arc::new(EchoProvider) },
        );

        let result = pipeline
            .process(
                request("My email is john@example.com, analyze"),
                OperationType::Generation,
                Duration::from_secs(5),
            )
            .await;
        assert!(matches!(result, Err(CoreError::PolicyBlocked { .. })));
    }
}
