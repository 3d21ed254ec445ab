//! Funnelworks — session-attributed conversion-funnel analytics service.
//!
//! Main entry point: initializes tracing, loads configuration, selects the
//! store backend, and starts the API server.

use clap::Parser;
use funnel_api::ApiServer;
use funnel_core::config::AppConfig;
use funnel_platform::FixedWindowLimiter;
use funnel_store::{AnalyticsStore, ClickHouseStore, MemoryStore};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "funnel-server")]
#[command(about = "Session-attributed conversion-funnel analytics service")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "FUNNELWORKS__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "FUNNELWORKS__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Serve from the in-memory store instead of ClickHouse
    /// (development mode)
    #[arg(long, default_value_t = false)]
    memory_store: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "funnel_server=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Funnelworks starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        "Configuration loaded"
    );

    // Select the store backend
    let store: Arc<dyn AnalyticsStore> = if cli.memory_store {
        info!("Using in-memory store (development mode)");
        Arc::new(MemoryStore::new())
    } else {
        let store = ClickHouseStore::new(&config.clickhouse)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to connect to ClickHouse");
                anyhow::anyhow!(e)
            })?;
        Arc::new(store)
    };

    // Rate limiter is built once here and injected into the API layer.
    let limiter = Arc::new(FixedWindowLimiter::new(&config.rate_limit));

    let api_server = ApiServer::new(config, store, limiter);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Funnelworks is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
