//! # Configuration Management Module
//!
//! Loading, validation, and environment-variable overrides for every setting
//! the control plane needs: the HTTP server, provider registry, the base
//! transport-routing/failover policy, caching, logging, metrics, and the
//! safety-and-steering subsystem (guardrails, circuit breaker, latency
//! targets, optimizer, health monitor, orchestrator, emergency shutdown,
//! activation monitor, and the intelligent router's rule set).
//!
//! ## Environment Variables
//!
//! - `AEGIS_HOST` / `AEGIS_PORT` / `AEGIS_TIMEOUT`
//! - `AEGIS_LOG_LEVEL`
//! - `AEGIS_CACHE_BACKEND` / `AEGIS_REDIS_URL`
//! - `<PROVIDER>_API_KEY`, `<PROVIDER>_CB_FAILURE_THRESHOLD`, `<PROVIDER>_CB_RECOVERY_TIMEOUT`, `<PROVIDER>_CB_REQUEST_TIMEOUT`
//! - `AEGIS_SAFETY_BLOCK_ON_VIOLATION`
//! - `AEGIS_SHUTDOWN_AUTO`

use aegis_core::providers::ProviderConfig;
use aegis_core::routing::RoutingStrategy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::model::{OperationType, Priority, RouteType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub providers: HashMap<String, ProviderConfig>,
    pub routing: RoutingConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
    pub safety: SafetyConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub latency: LatencyConfig,
    pub optimizer: OptimizerConfig,
    pub health: HealthConfig,
    pub orchestrator: OrchestratorConfig,
    pub shutdown: ShutdownConfig,
    pub activation: ActivationConfig,
    pub router: RouterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub max_requests: usize,
    #[serde(with = "aegis_core::common::duration_serde")]
    pub retention_duration: Duration,
    #[serde(with = "aegis_core::common::duration_serde")]
    pub cleanup_interval: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(with = "aegis_core::common::duration_serde")]
    pub timeout: Duration,
    pub max_body_size: usize,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub max_age: Option<Duration>,
}

/// Base transport-level routing/failover policy for the provider SDK layer
/// (distinct from [`RouterConfig`], which drives the control plane's
/// `RoutingRule`-based DIRECT/MEDIATED decisions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub strategy: RoutingStrategy,
    #[serde(with = "aegis_core::common::duration_serde")]
    pub health_check_interval: Duration,
    pub failover_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub backend: CacheBackend,
    #[serde(with = "aegis_core::common::duration_serde")]
    pub ttl: Duration,
    pub max_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CacheBackend {
    Memory,
    Redis { url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogOutput {
    Stdout,
    File { path: String },
}

/// Safety detector / guardrails configuration (spec §4.1-4.2, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    pub enable_pii: bool,
    pub enable_toxicity: bool,
    pub enable_prompt_injection: bool,
    pub enable_bedrock_guardrails: bool,
    pub strict_mode: bool,
    pub block_on_violation: bool,
    pub redaction_mode: RedactionMode,
    pub confidence_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RedactionMode {
    Mask,
    Remove,
    Replace,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            enable_pii: true,
            enable_toxicity: true,
            enable_prompt_injection: true,
            enable_bedrock_guardrails: false,
            strict_mode: false,
            block_on_violation: true,
            redaction_mode: RedactionMode::Mask,
            confidence_threshold: 0.7,
        }
    }
}

/// Per-path circuit breaker configuration (spec §4.3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    #[serde(with = "aegis_core::common::duration_serde")]
    pub recovery_timeout: Duration,
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_max_calls: 2,
        }
    }
}

/// Latency monitor targets and thresholds (spec §4.4, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyConfig {
    pub max_metrics: usize,
    #[serde(with = "aegis_core::common::duration_serde")]
    pub time_window: Duration,
    pub generation_target_ms: u64,
    pub rag_target_ms: u64,
    pub cached_target_ms: u64,
    pub cache_hit_target_pct: f64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            max_metrics: 10_000,
            time_window: Duration::from_secs(300),
            generation_target_ms: 1500,
            rag_target_ms: 300,
            cached_target_ms: 300,
            cache_hit_target_pct: 80.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OptimizationStrategy {
    Balanced,
    CostEfficient,
    LatencyFirst,
}

/// Routing efficiency optimizer configuration (spec §4.9, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub target_performance_improvement_pct: f64,
    #[serde(with = "aegis_core::common::duration_serde")]
    pub interval: Duration,
    #[serde(with = "aegis_core::common::duration_serde")]
    pub evaluation_window: Duration,
    pub max_rule_changes: usize,
    pub min_data_points: u64,
    pub rollback_threshold_pct: f64,
    pub default_strategy: OptimizationStrategy,
    pub adaptive: bool,
    pub auto_rollback: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            target_performance_improvement_pct: 15.0,
            interval: Duration::from_secs(300),
            evaluation_window: Duration::from_secs(900),
            max_rule_changes: 3,
            min_data_points: 100,
            rollback_threshold_pct: -5.0,
            default_strategy: OptimizationStrategy::Balanced,
            adaptive: true,
            auto_rollback: true,
        }
    }
}

/// Intelligent health monitor configuration (spec §4.8, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(with = "aegis_core::common::duration_serde")]
    pub check_interval: Duration,
    pub history: usize,
    pub cpu_warn_pct: f64,
    pub cpu_crit_pct: f64,
    pub mem_warn_pct: f64,
    pub mem_crit_pct: f64,
    pub error_rate_warn: f64,
    pub error_rate_crit: f64,
    pub response_time_warn_ms: u64,
    pub response_time_crit_ms: u64,
    pub throughput_low: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            history: 1000,
            cpu_warn_pct: 85.0,
            cpu_crit_pct: 95.0,
            mem_warn_pct: 90.0,
            mem_crit_pct: 95.0,
            error_rate_warn: 0.05,
            error_rate_crit: 0.10,
            response_time_warn_ms: 2000,
            response_time_crit_ms: 5000,
            throughput_low: 100.0,
        }
    }
}

/// System optimization orchestrator configuration (spec §4.11, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub health_score_threshold: f64,
    pub critical_anomaly_threshold: usize,
    pub high_priority_recommendation_threshold: usize,
    pub auto_execute_enabled: bool,
    pub max_priority_level: u8,
    pub requires_approval: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            health_score_threshold: 0.8,
            critical_anomaly_threshold: 1,
            high_priority_recommendation_threshold: 2,
            auto_execute_enabled: true,
            max_priority_level: 7,
            requires_approval: vec!["scaling".to_string(), "maintenance".to_string()],
        }
    }
}

/// Emergency shutdown manager configuration (spec §4.10, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    pub auto_shutdown: bool,
    pub error_rate_threshold: f64,
    pub latency_threshold_ms: u64,
    pub cost_euro_per_hour_threshold: f64,
    pub consecutive_failures_threshold: u32,
    pub recovery_enabled: bool,
    #[serde(with = "aegis_core::common::duration_serde")]
    pub recovery_delay: Duration,
    #[serde(with = "aegis_core::common::duration_serde")]
    pub health_check_interval: Duration,
    pub max_recovery_attempts: u32,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            auto_shutdown: true,
            error_rate_threshold: 0.1,
            latency_threshold_ms: 5000,
            cost_euro_per_hour_threshold: 100.0,
            consecutive_failures_threshold: 5,
            recovery_enabled: true,
            recovery_delay: Duration::from_secs(300),
            health_check_interval: Duration::from_secs(30),
            max_recovery_attempts: 3,
        }
    }
}

/// Activation monitor configuration (spec §4.7, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationConfig {
    pub success_rate_threshold_pct: f64,
    pub warning_threshold_pct: f64,
    pub max_operation_duration_ms: u64,
    pub retention_days: u32,
    pub batch_size: usize,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            success_rate_threshold_pct: 99.0,
            warning_threshold_pct: 95.0,
            max_operation_duration_ms: 5000,
            retention_days: 30,
            batch_size: 100,
        }
    }
}

/// A single declarative routing rule, as loaded from configuration, prior to
/// being handed to the `IntelligentRouter`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRuleConfig {
    pub operation_type: OperationType,
    pub priority: Priority,
    pub latency_requirement_ms: u64,
    pub primary: RouteType,
    pub fallback: RouteType,
    pub health_check_required: bool,
}

impl From<RoutingRuleConfig> for crate::model::RoutingRule {
    fn from(r: RoutingRuleConfig) -> Self {
        crate::model::RoutingRule {
            operation_type: r.operation_type,
            priority: r.priority,
            latency_requirement_ms: r.latency_requirement_ms,
            primary: r.primary,
            fallback: r.fallback,
            health_check_required: r.health_check_required,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub rules: Vec<RoutingRuleConfig>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                RoutingRuleConfig {
                    operation_type: OperationType::Generation,
                    priority: Priority::High,
                    latency_requirement_ms: 1500,
                    primary: RouteType::Direct,
                    fallback: RouteType::Mediated,
                    health_check_required: true,
                },
                RoutingRuleConfig {
                    operation_type: OperationType::Rag,
                    priority: Priority::Medium,
                    latency_requirement_ms: 300,
                    primary: RouteType::Mediated,
                    fallback: RouteType::Direct,
                    health_check_required: true,
                },
                RoutingRuleConfig {
                    operation_type: OperationType::Cached,
                    priority: Priority::Low,
                    latency_requirement_ms: 300,
                    primary: RouteType::Direct,
                    fallback: RouteType::Direct,
                    health_check_required: false,
                },
            ],
        }
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(host) = env::var("AEGIS_HOST") {
            if !host.is_empty() {
                self.server.host = host;
            }
        }

        if let Ok(port_str) = env::var("AEGIS_PORT") {
            let port: u16 = port_str
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid AEGIS_PORT: {}", port_str))?;
            if port > 0 {
                self.server.port = port;
            }
        }

        if let Ok(timeout) = env::var("AEGIS_TIMEOUT") {
            self.server.timeout = parse_duration(&timeout)?;
        }

        for (provider_name, provider_config) in &mut self.providers {
            let env_key = format!("{}_API_KEY", provider_name.to_uppercase().replace('-', "_"));
            if let Ok(api_key) = env::var(&env_key) {
                if !api_key.is_empty() {
                    provider_config.api_key = api_key;
                    tracing::debug!("Loaded API key for provider: {}", provider_name);
                }
            } else if provider_config.api_key.is_empty()
                && !provider_name.to_lowercase().contains("ollama")
            {
                tracing::warn!(
                    "No API key found for provider: {} (set {} environment variable)",
                    provider_name,
                    env_key
                );
            }

            let cb_failure_threshold_key = format!(
                "{}_CB_FAILURE_THRESHOLD",
                provider_name.to_uppercase().replace('-', "_")
            );
            let cb_recovery_timeout_key = format!(
                "{}_CB_RECOVERY_TIMEOUT",
                provider_name.to_uppercase().replace('-', "_")
            );
            let cb_request_timeout_key = format!(
                "{}_CB_REQUEST_TIMEOUT",
                provider_name.to_uppercase().replace('-', "_")
            );

            if let (Ok(failure_threshold), Ok(recovery_timeout), Ok(request_timeout)) = (
                env::var(&cb_failure_threshold_key),
                env::var(&cb_recovery_timeout_key),
                env::var(&cb_request_timeout_key),
            ) {
                if let (Ok(failure_threshold), Ok(recovery_timeout), Ok(request_timeout)) = (
                    failure_threshold.parse::<u32>(),
                    parse_duration(&recovery_timeout),
                    parse_duration(&request_timeout),
                ) {
                    provider_config.circuit_breaker = Some(
                        aegis_core::circuit_breaker::CircuitBreakerConfig {
                            failure_threshold,
                            recovery_timeout,
                            request_timeout,
                            half_open_max_calls: 3,
                        },
                    );
                }
            }
        }

        if let Ok(backend) = env::var("AEGIS_CACHE_BACKEND") {
            match backend.as_str() {
                "memory" => self.cache.backend = CacheBackend::Memory,
                "redis" => {
                    let url = env::var("AEGIS_REDIS_URL")
                        .unwrap_or_else(|_| "redis://localhost:6379".to_string());
                    if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                        return Err(anyhow::anyhow!("Invalid Redis URL format: {}", url));
                    }
                    self.cache.backend = CacheBackend::Redis { url };
                }
                _ => {
                    return Err(anyhow::anyhow!(
                        "Invalid cache backend: {}. Use 'memory' or 'redis'",
                        backend
                    ));
                }
            }
        }

        if let Ok(level) = env::var("AEGIS_LOG_LEVEL") {
            let valid_levels = ["trace", "debug", "info", "warn", "error"];
            if valid_levels.contains(&level.as_str()) {
                self.logging.level = level;
            } else {
                return Err(anyhow::anyhow!(
                    "Invalid log level: {}. Use: {:?}",
                    level,
                    valid_levels
                ));
            }
        }

        if let Ok(v) = env::var("AEGIS_SAFETY_BLOCK_ON_VIOLATION") {
            self.safety.block_on_violation = v.parse().unwrap_or(self.safety.block_on_violation);
        }

        if let Ok(v) = env::var("AEGIS_SHUTDOWN_AUTO") {
            self.shutdown.auto_shutdown = v.parse().unwrap_or(self.shutdown.auto_shutdown);
        }

        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_server()?;
        self.validate_providers()?;
        self.validate_cache()?;
        self.validate_metrics()?;
        self.validate_logging()?;
        self.validate_safety()?;
        self.validate_circuit_breaker()?;
        self.validate_optimizer()?;
        Ok(())
    }

    fn validate_server(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port must be between 1 and 65535"));
        }
        if self.server.max_body_size == 0 {
            return Err(anyhow::anyhow!("Max body size cannot be 0"));
        }
        if self.server.timeout.as_secs() == 0 {
            return Err(anyhow::anyhow!("Server timeout cannot be 0"));
        }
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }
        Ok(())
    }

    fn validate_providers(&self) -> anyhow::Result<()> {
        for (name, provider) in &self.providers {
            if !provider.enabled {
                continue;
            }
            if provider.timeout.as_secs() == 0 {
                return Err(anyhow::anyhow!("Provider {} has zero timeout", name));
            }
            if let Some(base_url) = &provider.base_url {
                if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                    return Err(anyhow::anyhow!(
                        "Provider {} base_url must start with http:// or https://",
                        name
                    ));
                }
            }
        }
        Ok(())
    }

    fn validate_cache(&self) -> anyhow::Result<()> {
        if self.cache.enabled {
            if self.cache.max_size == 0 {
                return Err(anyhow::anyhow!("Cache enabled but max size is 0"));
            }
            if self.cache.ttl.as_secs() == 0 {
                return Err(anyhow::anyhow!("Cache TTL cannot be 0"));
            }
            if let CacheBackend::Redis { url } = &self.cache.backend {
                if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                    return Err(anyhow::anyhow!(
                        "Redis URL must start with redis:// or rediss://"
                    ));
                }
            }
        }
        Ok(())
    }

    fn validate_metrics(&self) -> anyhow::Result<()> {
        if self.metrics.enabled {
            if self.metrics.max_requests == 0 {
                return Err(anyhow::anyhow!("Metrics max_requests cannot be 0"));
            }
            if self.metrics.cleanup_interval > self.metrics.retention_duration {
                return Err(anyhow::anyhow!(
                    "Metrics cleanup_interval cannot be longer than retention_duration"
                ));
            }
        }
        Ok(())
    }

    fn validate_logging(&self) -> anyhow::Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }

    fn validate_safety(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.safety.confidence_threshold) {
            return Err(anyhow::anyhow!(
                "safety.confidence_threshold must be in [0,1]"
            ));
        }
        Ok(())
    }

    fn validate_circuit_breaker(&self) -> anyhow::Result<()> {
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(anyhow::anyhow!("circuit_breaker.failure_threshold cannot be 0"));
        }
        Ok(())
    }

    fn validate_optimizer(&self) -> anyhow::Result<()> {
        if self.optimizer.max_rule_changes == 0 {
            return Err(anyhow::anyhow!("optimizer.max_rule_changes cannot be 0"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                timeout: Duration::from_secs(30),
                max_body_size: 1024 * 1024,
                cors: CorsConfig {
                    enabled: true,
                    allowed_origins: vec!["*".to_string()],
                    allowed_methods: vec!["GET".to_string(), "POST".to_string()],
                    allowed_headers: vec!["*".to_string()],
                    max_age: Some(Duration::from_secs(3600)),
                },
            },
            providers: HashMap::new(),
            routing: RoutingConfig {
                strategy: RoutingStrategy::Single,
                health_check_interval: Duration::from_secs(30),
                failover_threshold: 0.8,
            },
            cache: CacheConfig {
                enabled: true,
                backend: CacheBackend::Memory,
                ttl: Duration::from_secs(300),
                max_size: 1000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
                output: LogOutput::Stdout,
            },
            metrics: MetricsConfig {
                enabled: true,
                max_requests: 10000,
                retention_duration: Duration::from_secs(3600),
                cleanup_interval: Duration::from_secs(300),
            },
            safety: SafetyConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            latency: LatencyConfig::default(),
            optimizer: OptimizerConfig::default(),
            health: HealthConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            shutdown: ShutdownConfig::default(),
            activation: ActivationConfig::default(),
            router: RouterConfig::default(),
        }
    }
}

pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    aegis_core::common::duration_serde::parse_duration(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_confidence_threshold() {
        let mut config = Config::default();
        config.safety.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_router_has_three_operation_rules() {
        let config = Config::default();
        assert_eq!(config.router.rules.len(), 3);
    }
}
