//! # Aegis Control Plane
//!
//! The safety-and-steering control plane that fronts an AI-orchestration
//! platform: an intelligent router choosing between a direct and a mediated
//! execution path, a pre/post safety pipeline, latency/drift/activation
//! telemetry, a health monitor that rolls all of it up into a single score,
//! and an optimization orchestrator that closes the loop.
//!
//! [`wiring::Wiring`] assembles the whole object graph once at startup;
//! [`pipeline::RequestPipeline`] is the per-request entry point; `server`
//! exposes it over HTTP.

pub mod config;
pub mod error;
pub mod external;
pub mod feature_flags;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod model;
pub mod optimization;
pub mod pipeline;
pub mod providers_adapter;
pub mod routing;
pub mod safety;
pub mod server;
pub mod telemetry;
pub mod wiring;

pub use server::create_server;

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::wiring::Wiring;

    #[tokio::test]
    async fn default_config_assembles_wiring() {
        let config = Config::default();
        let wiring = Wiring::assemble(&config);
        assert!(wiring.is_ok());
    }

    #[tokio::test]
    async fn server_builds_from_default_config() {
        let app = crate::create_server(Config::default()).await;
        assert!(app.is_ok());
    }
}
