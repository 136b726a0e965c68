//! TrimTrack — barbershop loyalty & performance engine service.
//!
//! Main entry point that wires the visit ledger, achievement catalog,
//! redemption engine, and aggregation facade behind the REST API.

mod demo;

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use trimtrack_aggregation::AggregationFacade;
use trimtrack_api::ApiServer;
use trimtrack_core::catalog::AchievementCatalog;
use trimtrack_core::config::AppConfig;
use trimtrack_core::ledger::InMemoryLedger;
use trimtrack_leaderboard::MetricWeights;
use trimtrack_redemption::{InMemoryStore, RedemptionEngine};

#[derive(Parser, Debug)]
#[command(name = "trimtrack")]
#[command(about = "Barbershop loyalty & performance engine")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "TRIMTRACK__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "TRIMTRACK__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Metrics port (overrides config)
    #[arg(long, env = "TRIMTRACK__METRICS__PORT")]
    metrics_port: Option<u16>,

    /// Seed an in-memory ledger and catalog for a runnable demo
    #[arg(long, default_value_t = false)]
    demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trimtrack=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("TrimTrack starting up");

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
    if let Some(port) = cli.metrics_port {
        config.metrics.port = port;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        metrics_port = config.metrics.port,
        "Configuration loaded"
    );

    // Wire the ledger and catalog. Production deployments swap the
    // in-memory ledger for the platform's document store.
    let ledger = Arc::new(InMemoryLedger::new());
    let catalog = if cli.demo {
        demo::seed(&ledger);
        Arc::new(demo::catalog()?)
    } else {
        Arc::new(AchievementCatalog::new(Vec::new())?)
    };

    let engine = Arc::new(RedemptionEngine::new(Arc::new(InMemoryStore::new())));
    let facade = Arc::new(AggregationFacade::new(
        ledger.clone(),
        catalog.clone(),
        engine.clone(),
        MetricWeights::from(&config.leaderboard),
    ));

    // Start API server
    let api_server = ApiServer::new(config.clone(), facade, engine, catalog);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("TrimTrack is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
