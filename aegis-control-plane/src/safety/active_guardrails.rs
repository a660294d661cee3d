//! # Active Guardrails Manager
//!
//! Orchestrates pre-request and post-response safety checks around a single
//! provider invocation. Degrades safely: any internal error becomes a
//! `SystemError` violation rather than a panic or an unhandled exception.

use std::sync::Arc;
use std::time::Duration;

use crate::external::{ContentPolicySink, ProviderClient};
use crate::model::{Request, Response, Severity, Violation, ViolationType};
use crate::safety::guardrails::GuardrailsService;

pub struct ActiveGuardrailsManager<S: ContentPolicySink> {
    guardrails: GuardrailsService<S>,
}

pub enum GuardedOutcome {
    Allowed {
        response: Response,
        input_verdict: crate::model::SafetyVerdict,
        output_verdict: crate::model::SafetyVerdict,
        /// Set when the bedrock usage policy requested the router delegate
        /// to a different provider. Informational only; never blocks.
        bedrock_delegation_requested: bool,
    },
    Blocked {
        verdict: crate::model::SafetyVerdict,
        stage: Stage,
        bedrock_delegation_requested: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PreCheck,
    PostCheck,
}

impl<S: ContentPolicySink> ActiveGuardrailsManager<S> {
    pub fn new(guardrails: GuardrailsService<S>) -> Self {
        Self { guardrails }
    }

    /// Runs pre-check → provider invocation → post-check, in that order.
    /// The provider is never invoked if the pre-check blocks.
    pub async fn process(
        &self,
        request: &Request,
        provider: Arc<dyn ProviderClient>,
        deadline: Duration,
    ) -> GuardedOutcome {
        let input_verdict = self
            .guardrails
            .check_input(&request.prompt, &request.context.domain, request_id(request))
            .await;

        if !input_verdict.allowed {
            let bedrock_delegation_requested = self.guardrails.bedrock_delegation_requested(&input_verdict);
            return GuardedOutcome::Blocked {
                verdict: input_verdict,
                stage: Stage::PreCheck,
                bedrock_delegation_requested,
            };
        }

        let input_bedrock_delegation = self.guardrails.bedrock_delegation_requested(&input_verdict);

        let effective_request = match &input_verdict.modified {
            Some(modified) => {
                let mut r = request.clone();
                r.prompt = modified.clone();
                r
            }
            None => request.clone(),
        };

        let response = match provider.invoke(&effective_request, deadline).await {
            Ok(response) => response,
            Err(e) => {
                let mut verdict = crate::model::SafetyVerdict::allow();
                verdict.allowed = false;
                verdict.violations.push(Violation {
                    violation_type: ViolationType::SystemError,
                    severity: Severity::Critical,
                    confidence: 1.0,
                    details: format!("provider invocation failed: {e}"),
                    span: None,
                });
                return GuardedOutcome::Blocked {
                    verdict,
                    stage: Stage::PostCheck,
                    bedrock_delegation_requested: input_bedrock_delegation,
                };
            }
        };

        let output_verdict = self
            .guardrails
            .check_output(&response.content, &request.context.domain, request_id(request))
            .await;
        let output_bedrock_delegation = self.guardrails.bedrock_delegation_requested(&output_verdict);
        let bedrock_delegation_requested = input_bedrock_delegation || output_bedrock_delegation;

        if !output_verdict.allowed {
            return GuardedOutcome::Blocked {
                verdict: output_verdict,
                stage: Stage::PostCheck,
                bedrock_delegation_requested,
            };
        }

        let final_response = match &output_verdict.modified {
            Some(modified) => {
                let mut r = response;
                r.content = modified.clone();
                r
            }
            None => response,
        };

        GuardedOutcome::Allowed {
            response: final_response,
            input_verdict,
            output_verdict,
            bedrock_delegation_requested,
        }
    }
}

fn request_id(request: &Request) -> &str {
    request
        .metadata
        .get("request_id")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SafetyConfig;
    use crate::external::NoopContentPolicySink;
    use crate::model::{RequestContext, ResponseMetadata};
    use async_trait::async_trait;

    struct EchoProvider;

    #[async_trait]
    impl ProviderClient for EchoProvider {
        async fn invoke(&self, request: &Request, _deadline: Duration) -> anyhow::Result<Response> {
            Ok(Response {
                content: format!("echo: {}", request.prompt),
                provider: "echo".to_string(),
                metadata: ResponseMetadata::default(),
            })
        }
    }

    struct UnreachableProvider;

    #[async_trait]
    impl ProviderClient for UnreachableProvider {
        async fn invoke(&self, _request: &Request, _deadline: Duration) -> anyhow::Result<Response> {
            panic!("provider must not be invoked when pre-check blocks");
        }
    }

    fn manager() -> ActiveGuardrailsManager<NoopContentPolicySink> {
        ActiveGuardrailsManager::new(GuardrailsService::new(SafetyConfig::default(), NoopContentPolicySink))
    }

    #[tokio::test]
    async fn clean_request_reaches_provider() {
        let mgr = manager();
        let request = Request {
            prompt: "What is the best way to cook rice?".to_string(),
            context: RequestContext { domain: "culinary".to_string(), intent: "qa".to_string(), user_id: None },
            metadata: Default::default(),
        };
        let outcome = mgr.process(&request, Arc::new(EchoProvider), Duration::from_secs(1)).await;
        match outcome {
            GuardedOutcome::Allowed { response, .. } => assert!(response.content.starts_with("echo:")),
            GuardedOutcome::Blocked { .. } => panic!("expected allowed outcome"),
        }
    }

    #[tokio::test]
    async fn bedrock_delegation_is_recorded_without_blocking() {
        // A postal-code-only match carries confidence 0.60, below the default
        // 0.7 blocking threshold, so the verdict stays allowed while still
        // carrying a violation for the delegation policy to react to.
        let mut config = SafetyConfig::default();
        config.enable_bedrock_guardrails = true;
        let mgr = ActiveGuardrailsManager::new(GuardrailsService::new(config, NoopContentPolicySink));

        let request = Request {
            prompt: "My zip code is 10115".to_string(),
            context: RequestContext { domain: "culinary".to_string(), intent: "qa".to_string(), user_id: None },
            metadata: Default::default(),
        };
        let outcome = mgr.process(&request, Arc::new(EchoProvider), Duration::from_secs(1)).await;
        match outcome {
            GuardedOutcome::Allowed { bedrock_delegation_requested, .. } => {
                assert!(bedrock_delegation_requested);
            }
            GuardedOutcome::Blocked { .. } => panic!("postal code violation is below the blocking threshold"),
        }
    }

    #[tokio::test]
    async fn pii_request_never_reaches_provider() {
        let mgr = manager();
        let request = Request {
            prompt: "My email is john@example.com, analyze".to_string(),
            context: RequestContext { domain: "culinary".to_string(), intent: "qa".to_string(), user_id: None },
            metadata: Default::default(),
        };
        let outcome = mgr.process(&request, Arc::new(UnreachableProvider), Duration::from_secs(1)).await;
        match outcome {
            GuardedOutcome::Blocked { stage, .. } => assert_eq!(stage, Stage::PreCheck),
            GuardedOutcome::Allowed { .. } => panic!("expected blocked outcome"),
        }
    }
}
