//! Federated Learning Round Server
//!
//! This binary serves the `fl.round.FlRound` gRPC service: clients check in,
//! a quorum is selected and downloads the shared checkpoint, and uploaded
//! updates are averaged by an external aggregation script.
//!
//! # Usage
//!
//! ```bash
//! # Start with default settings (two check-ins, one update per round)
//! fl-server
//!
//! # Start with custom port and limits
//! fl-server --port 50052 --checkin-limit 5 --update-limit 3
//!
//! # Start with configuration file
//! fl-server --config fl-server.toml
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tonic::transport::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fl_coordinator::FlRoundService;
use round_core::{ProcessAggregator, ServerConfig};

/// Federated Learning Round Server
#[derive(Parser, Debug)]
#[command(name = "fl-server")]
#[command(about = "Round coordination server for federated learning")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Address to bind to
    #[arg(short, long)]
    address: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Check-ins needed to select a round
    #[arg(long)]
    checkin_limit: Option<u64>,

    /// Finished updates needed to aggregate
    #[arg(long)]
    update_limit: Option<u64>,

    /// Window for the check-in quorum in milliseconds
    #[arg(long)]
    round_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(address) = &self.address {
            config.server.address = address.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(limit) = self.checkin_limit {
            config.round.checkin_limit = limit;
        }
        if let Some(limit) = self.update_limit {
            config.round.update_limit = limit;
        }
        if let Some(timeout) = self.round_timeout_ms {
            config.round.round_timeout_ms = timeout;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // File, then environment, then command line
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    }
    .with_env_overrides();
    args.apply(&mut config);
    config.validate()?;

    tracing::info!("Starting FL round server");
    tracing::info!("  Check-in limit: {}", config.round.checkin_limit);
    tracing::info!("  Update limit: {}", config.round.update_limit);
    tracing::info!("  Round window: {}ms", config.round.round_timeout_ms);
    tracing::info!("  Storage: {}", config.storage.base_path.display());
    tracing::info!(
        "  Aggregation: {} {}",
        config.aggregation.program,
        config.aggregation.script.display()
    );

    let aggregator = Arc::new(ProcessAggregator::new(&config.aggregation));
    let (service, _coordinator) = FlRoundService::from_config(&config, aggregator).await?;

    // Build address
    let addr: SocketAddr = format!("{}:{}", config.server.address, config.server.port).parse()?;

    tracing::info!("Listening on {}", addr);

    // Start gRPC server
    Server::builder()
        .add_service(service.into_server())
        .serve_with_shutdown(addr, async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            tracing::info!("Shutting down round server...");
        })
        .await?;

    Ok(())
}
