//! REST API handlers for funnel reports, time-series rebucketing,
//! cross-tenant rollups, and operational endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use funnel_core::config::ReportConfig;
use funnel_core::error::FunnelError;
use funnel_core::types::{
    EntityKind, EventFilter, Granularity, ReportWindow, TimeSeriesPoint,
};
use funnel_platform::FixedWindowLimiter;
use funnel_reporting::rollup::{rollup_tenants, RollupResult, TenantSummary};
use funnel_reporting::{compute_funnel_report, rebucket, FunnelReport, ReportRequest};
use funnel_store::AnalyticsStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;
use uuid::Uuid;

/// Shared application state for REST handlers. The limiter is injected
/// here rather than held as module state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AnalyticsStore>,
    pub limiter: Arc<FixedWindowLimiter>,
    pub report: ReportConfig,
    pub node_id: String,
    pub start_time: Instant,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Error type returned by every handler; maps the core taxonomy onto
/// HTTP statuses.
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl ApiError {
    fn rate_limited(reset_at: DateTime<Utc>) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            error: "rate_limited",
            message: format!("rate limit exceeded, retry after {reset_at}"),
        }
    }
}

impl From<FunnelError> for ApiError {
    fn from(err: FunnelError) -> Self {
        match err {
            FunnelError::InvalidInput(message) => Self {
                status: StatusCode::BAD_REQUEST,
                error: "invalid_request",
                message,
            },
            FunnelError::Upstream(message) => Self {
                status: StatusCode::BAD_GATEWAY,
                error: "upstream_unavailable",
                message,
            },
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: "internal_error",
                message: other.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.error.to_string(),
                message: self.message,
            }),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct FunnelReportParams {
    /// Inclusive window bounds, RFC 3339.
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub granularity: Granularity,
    pub limit: Option<usize>,
    pub entity_kind: Option<EntityKind>,
    pub campaign: Option<String>,
    pub source: Option<String>,
    pub medium: Option<String>,
}

/// GET /v1/tenants/{tenant_id}/funnel-report
pub async fn funnel_report(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Query(params): Query<FunnelReportParams>,
) -> Result<Json<FunnelReport>, ApiError> {
    let decision = state.limiter.check(&format!("report:{tenant_id}"));
    if !decision.allowed {
        metrics::counter!("rate_limit.denied").increment(1);
        warn!(tenant_id = %tenant_id, "Funnel report request rate-limited");
        return Err(ApiError::rate_limited(decision.reset_at));
    }

    let window = ReportWindow::new(params.start, params.end)?;
    let limit = params.limit.unwrap_or(state.report.default_list_limit);
    if limit == 0 || limit > state.report.max_list_limit {
        metrics::counter!("api.validation_errors").increment(1);
        return Err(FunnelError::InvalidInput(format!(
            "limit must be between 1 and {}",
            state.report.max_list_limit
        ))
        .into());
    }

    let request = ReportRequest {
        tenant_id,
        window,
        granularity: params.granularity,
        filter: EventFilter {
            entity_kind: params.entity_kind,
            campaign: params.campaign,
            source: params.source,
            medium: params.medium,
        },
        limit,
    };

    let report = compute_funnel_report(state.store.as_ref(), &request).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct RebucketRequest {
    pub points: Vec<TimeSeriesPoint>,
    pub granularity: Granularity,
}

/// POST /v1/timeseries/rebucket — pure utility for chart callers.
pub async fn rebucket_series(
    Json(request): Json<RebucketRequest>,
) -> Result<Json<Vec<TimeSeriesPoint>>, ApiError> {
    let points = rebucket(&request.points, request.granularity)?;
    Ok(Json(points))
}

/// POST /v1/rollup — fan-in over already-computed per-tenant summaries.
pub async fn rollup_summaries(
    Json(summaries): Json<Vec<TenantSummary>>,
) -> Json<RollupResult> {
    Json(rollup_tenants(&summaries))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}

/// GET /health — Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready — Readiness probe for Kubernetes.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.start_time.elapsed().as_secs() > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /live — Liveness probe for Kubernetes.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
