//! # Aegis Control Plane Binary
//!
//! Entry point for the safety-and-steering control plane process: loads
//! configuration, builds the HTTP server over the [`aegis_control_plane`]
//! library, and serves it.
//!
//! ## Command Line Arguments
//!
//! - `--config, -c`: Path to configuration file (default: config.toml)
//! - `--port, -p`: Server port (default: 3000)
//! - `--host`: Server host address (default: 127.0.0.1)
//! - `--log-level`: Logging level (default: info)
//!
//! ## Environment Variables
//!
//! See [`aegis_control_plane::config`] for the full list of `AEGIS_*`
//! overrides applied on top of the loaded configuration file.

use clap::Parser;
use std::net::SocketAddr;

use aegis_control_plane::{config::Config, server::create_server};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Port number for the HTTP server.
    #[arg(short, long)]
    port: Option<u16>,

    /// Host address to bind the server to.
    #[arg(long)]
    host: Option<String>,

    /// Logging level for the application.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt().with_env_filter(&args.log_level).init();

    let mut config = if std::path::Path::new(&args.config).exists() {
        Config::load(&args.config)?
    } else {
        tracing::warn!(path = %args.config, "config file not found, starting from defaults");
        Config::default()
    };

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    config.validate()?;

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let app = create_server(config).await?;

    tracing::info!("starting aegis control plane on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
