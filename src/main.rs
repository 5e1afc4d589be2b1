//! Storefront service.
//!
//! # Architecture Overview
//!
//! ```text
//!   gateways (poll upstream fragments)
//!        │ ready (once each)
//!        ▼
//!   ReadinessBarrier ──► bootstrap pipeline ──► TransportServer::listen
//!                        deps, debug route,       plain / TLS / h2
//!                        headers, health,
//!                        page warm-up, routes
//!
//!   Client ──► default stack ──► RouteTable ──► page / health / debug
//! ```

use std::path::PathBuf;

use clap::Parser;

use storefront::config::load_config;
use storefront::lifecycle::signals::shutdown_signal;
use storefront::observability::{logging, metrics};
use storefront::Storefront;

#[derive(Parser)]
#[command(name = "storefront")]
#[command(about = "Compose pages from upstream gateway fragments", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "storefront.toml")]
    config: PathBuf,

    /// Override the configured port
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind to all interfaces instead of loopback
    #[arg(long)]
    bind_all: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging();

    tracing::info!("storefront v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(&cli.config)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.bind_all {
        config.server.bind_all_interfaces = true;
    }

    tracing::info!(
        path = %cli.config.display(),
        port = config.server.port,
        gateways = config.gateways.len(),
        pages = config.pages.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let storefront = Storefront::from_config(config)?;
    storefront
        .start(|result| match result {
            Ok(addr) => tracing::info!(address = %addr, "Ready for connections"),
            Err(e) => tracing::error!(error = %e, "Listener failed"),
        })
        .await?;

    shutdown_signal().await;
    storefront.shutdown().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
