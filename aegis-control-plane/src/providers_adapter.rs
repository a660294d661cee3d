//! # Provider Adapter
//!
//! Bridges [`crate::external::ProviderClient`] (the control plane's narrow
//! provider seam) onto `aegis_core::providers::Provider` (the SDK's full
//! chat-completion interface), so any of the SDK's existing provider
//! integrations can sit behind a [`crate::model::RouteType`] without the
//! routing/safety layers ever depending on a concrete provider crate.

use std::sync::Arc;
use std::time::Duration;

use aegis_core::models::{ChatRequest, Message};
use aegis_core::providers::{create_provider, Provider, ProviderConfig};
use async_trait::async_trait;

use crate::config::Config;
use crate::external::ProviderClient;
use crate::model::{Request as CoreRequest, Response as CoreResponse, ResponseMetadata};
use crate::pipeline::ProviderSet;

/// Wraps an SDK provider and a fixed model name behind [`ProviderClient`].
pub struct SdkProviderClient {
    provider: Arc<dyn Provider>,
    model: String,
}

impl SdkProviderClient {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self { provider, model: model.into() }
    }
}

#[async_trait]
impl ProviderClient for SdkProviderClient {
    async fn invoke(&self, request: &CoreRequest, deadline: Duration) -> anyhow::Result<CoreResponse> {
        let chat_request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(format!("domain: {}, intent: {}", request.context.domain, request.context.intent)),
                Message::user(request.prompt.clone()),
            ],
            ..Default::default()
        };

        let started = std::time::Instant::now();
        let response = tokio::time::timeout(deadline, self.provider.chat_completion(chat_request))
            .await
            .map_err(|_| anyhow::anyhow!("provider call exceeded deadline of {:?}", deadline))?
            .map_err(|e| anyhow::anyhow!("provider error: {e}"))?;

        let content = response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(CoreResponse {
            content,
            provider: self.provider.name().to_string(),
            metadata: ResponseMetadata {
                tokens: response.usage.map(|u| u.total_tokens as u64),
                latency_ms: Some(started.elapsed().as_millis() as u64),
                cost: None,
            },
        })
    }
}

/// Builds the direct and mediated [`ProviderClient`]s from `config.providers`.
/// Looks for entries named `"direct"` and `"mediated"`; either side falls
/// back to a local Ollama instance so the pipeline still runs end to end
/// with no provider keys configured (mirrors the SDK's own
/// no-providers-configured-default-to-ollama behavior).
pub fn build_provider_set(config: &Config) -> anyhow::Result<ProviderSet> {
    let direct = resolve_provider(config, "direct")?;
    let mediated = resolve_provider(config, "mediated")?;
    Ok(ProviderSet { direct, mediated })
}

fn resolve_provider(config: &Config, key: &str) -> anyhow::Result<Arc<dyn ProviderClient>> {
    let provider_config = config
        .providers
        .get(key)
        .cloned()
        .unwrap_or_else(|| ProviderConfig::new("ollama", "").with_base_url("http://localhost:11434"));
    let model = provider_config
        .model_mapping
        .values()
        .next()
        .cloned()
        .unwrap_or_else(|| "default".to_string());
    let provider: Arc<dyn Provider> = Arc::from(create_provider(provider_config)?);
    Ok(Arc::new(SdkProviderClient::new(provider, model)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::error::ProviderError;
    use aegis_core::models::{Choice, ChatResponse, Message, Usage};
    use aegis_core::providers::{HealthStatus, ProviderHealth, StreamResult};
    use std::collections::HashMap;

    struct MockProvider {
        reply: String,
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn supports_streaming(&self) -> bool {
            false
        }

        fn supports_function_calling(&self) -> bool {
            false
        }

        fn supported_models(&self) -> Vec<String> {
            vec!["mock-model".to_string()]
        }

        async fn chat_completion(&self, _request: ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                id: "mock-1".to_string(),
                object: "chat.completion".to_string(),
                created: 0,
                model: "mock-model".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant(self.reply.clone()),
                    finish_reason: Some("stop".to_string()),
                    logprobs: None,
                }],
                usage: Some(Usage { prompt_tokens: 5, completion_tokens: 3, total_tokens: 8 }),
                system_fingerprint: None,
            })
        }

        async fn stream_chat_completion(&self, _request: ChatRequest) -> Result<StreamResult, ProviderError> {
            Err(ProviderError::Configuration { message: "streaming not supported by mock".to_string() })
        }

        async fn health_check(&self) -> Result<ProviderHealth, ProviderError> {
            Ok(ProviderHealth {
                status: HealthStatus::Healthy,
                latency_ms: Some(1),
                error_rate: 0.0,
                last_check: chrono::Utc::now(),
                details: HashMap::new(),
            })
        }
    }

    fn core_request(prompt: &str) -> CoreRequest {
        CoreRequest {
            prompt: prompt.to_string(),
            context: crate::model::RequestContext {
                domain: "culinary".to_string(),
                intent: "qa".to_string(),
                user_id: None,
            },
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn invoke_maps_chat_response_into_core_response() {
        let client = SdkProviderClient::new(Arc::new(MockProvider { reply: "seared scallops".to_string() }), "mock-model");
        let response = client
            .invoke(&core_request("suggest a dish"), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(response.content, "seared scallops");
        assert_eq!(response.provider, "mock");
        assert_eq!(response.metadata.tokens, Some(8));
    }

    #[tokio::test]
    async fn invoke_times_out_when_provider_exceeds_deadline() {
        struct SlowProvider;

        #[async_trait]
        impl Provider for SlowProvider {
            fn name(&self) -> &str {
                "slow"
            }
            fn supports_streaming(&self) -> bool {
                false
            }
            fn supports_function_calling(&self) -> bool {
                false
            }
            fn supported_models(&self) -> Vec<String> {
                vec![]
            }
            async fn chat_completion(&self, _request: ChatRequest) -> Result<ChatResponse, ProviderError> {
                tokio::time::sleep(Duration::from_millis(50)).await;
                unreachable!("deadline should fire first")
            }
            async fn stream_chat_completion(&self, _request: ChatRequest) -> Result<StreamResult, ProviderError> {
                Err(ProviderError::Configuration { message: "unsupported".to_string() })
            }
            async fn health_check(&self) -> Result<ProviderHealth, ProviderError> {
                Ok(ProviderHealth {
                    status: HealthStatus::Healthy,
                    latency_ms: None,
                    error_rate: 0.0,
                    last_check: chrono::Utc::now(),
                    details: HashMap::new(),
                })
            }
        }

        let client = SdkProviderClient::new(Arc::new(SlowProvider), "mock-model");
        let result = client.invoke(&core_request("anything"), Duration::from_millis(5)).await;
        assert!(result.is_err());
    }

    #[test]
    fn build_provider_set_falls_back_to_ollama_with_no_providers_configured() {
        let config = Config::default();
        assert!(build_provider_set(&config).is_ok());
    }
}
