//! Service router binary.
//!
//! Loads configuration, wires the forwarding stack, and serves HTTP.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ai_router::config;
use ai_router::HttpServer;

#[derive(Parser)]
#[command(name = "ai-router")]
#[command(about = "HTTP failover router for AI services", long_about = None)]
struct Args {
    /// Path to the config file (JSON or TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ai_router=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = config::load_or_fallback(args.config.as_deref());
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    tracing::info!(
        services = config.ai_services.len(),
        strategy = ?config.load_balancing.strategy,
        failure_threshold = config.circuit_breaker.failure_threshold,
        recovery_timeout_secs = config.circuit_breaker.recovery_timeout,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
