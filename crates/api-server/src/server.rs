//! API server — HTTP REST surface plus the Prometheus metrics exporter.

use crate::rest::{self, AppState};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use trimtrack_aggregation::AggregationFacade;
use trimtrack_core::catalog::AchievementCatalog;
use trimtrack_core::config::AppConfig;
use trimtrack_redemption::RedemptionEngine;

pub struct ApiServer {
    config: AppConfig,
    facade: Arc<AggregationFacade>,
    engine: Arc<RedemptionEngine>,
    catalog: Arc<AchievementCatalog>,
}

impl ApiServer {
    pub fn new(
        config: AppConfig,
        facade: Arc<AggregationFacade>,
        engine: Arc<RedemptionEngine>,
        catalog: Arc<AchievementCatalog>,
    ) -> Self {
        Self {
            config,
            facade,
            engine,
            catalog,
        }
    }

    /// Start the HTTP REST server. Blocks until shutdown.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let state = AppState {
            facade: self.facade.clone(),
            engine: self.engine.clone(),
            catalog: self.catalog.clone(),
            node_id: self.config.node_id.clone(),
            start_time: Instant::now(),
        };

        let app = Router::new()
            // Loyalty endpoints
            .route("/v1/progress/:subject_id", get(rest::handle_progress))
            .route("/v1/leaderboard", get(rest::handle_leaderboard))
            .route("/v1/redemptions/request", post(rest::handle_request_redemption))
            .route("/v1/redemptions/confirm", post(rest::handle_confirm_redemption))
            .route(
                "/v1/redemptions/:subject_id/:achievement_id/history",
                get(rest::handle_redemption_history),
            )
            // Operational endpoints
            .route("/health", get(rest::health_check))
            .route("/ready", get(rest::readiness))
            .route("/live", get(rest::liveness))
            // Middleware
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        let handle = builder
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install_recorder()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");

        // Keep the handle alive
        std::mem::forget(handle);
        Ok(())
    }
}
