//! API server — wires the store, rate limiter, and REST routes together.

use crate::rest::{self, AppState};
use axum::routing::{get, post};
use axum::Router;
use funnel_core::config::AppConfig;
use funnel_platform::FixedWindowLimiter;
use funnel_store::AnalyticsStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct ApiServer {
    config: AppConfig,
    store: Arc<dyn AnalyticsStore>,
    limiter: Arc<FixedWindowLimiter>,
}

impl ApiServer {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn AnalyticsStore>,
        limiter: Arc<FixedWindowLimiter>,
    ) -> Self {
        Self {
            config,
            store,
            limiter,
        }
    }

    /// Start the HTTP REST server (blocks until shutdown).
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let state = AppState {
            store: self.store.clone(),
            limiter: self.limiter.clone(),
            report: self.config.report.clone(),
            node_id: self.config.node_id.clone(),
            start_time: Instant::now(),
        };

        let app = Router::new()
            // Analytics endpoints
            .route(
                "/v1/tenants/:tenant_id/funnel-report",
                get(rest::funnel_report),
            )
            .route("/v1/timeseries/rebucket", post(rest::rebucket_series))
            .route("/v1/rollup", post(rest::rollup_summaries))
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
