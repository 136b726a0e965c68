//! REST API handlers for loyalty progress, leaderboards, redemptions, and
//! operational endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;
use uuid::Uuid;

use trimtrack_aggregation::{
    AggregationFacade, LeaderboardOutcome, RankingWindow, SubjectSummary,
};
use trimtrack_core::catalog::AchievementCatalog;
use trimtrack_core::error::EngineError;
use trimtrack_leaderboard::RankingMetric;
use trimtrack_redemption::{RedemptionEngine, RedemptionRecord, TransitionEvent};

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub facade: Arc<AggregationFacade>,
    pub engine: Arc<RedemptionEngine>,
    pub catalog: Arc<AchievementCatalog>,
    pub node_id: String,
    pub start_time: Instant,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Maps engine errors to HTTP statuses. Stale-view conflicts surface as
/// 409 so clients re-fetch rather than retry.
fn map_error(e: EngineError) -> ApiError {
    let (status, code) = match &e {
        EngineError::InvalidState(_) => (StatusCode::CONFLICT, "invalid_state"),
        EngineError::CompletionLimitExceeded(_) => (StatusCode::CONFLICT, "completion_limit"),
        EngineError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        EngineError::DataUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "data_unavailable"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message: e.to_string(),
        }),
    )
}

// ─── Loyalty Endpoints ──────────────────────────────────────────────────────

/// GET /v1/progress/:subject_id — Per-achievement progress and redemption
/// state for one subject.
pub async fn handle_progress(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> Result<Json<SubjectSummary>, ApiError> {
    metrics::counter!("api.progress_requests").increment(1);
    state
        .facade
        .subject_summary(&subject_id, Utc::now())
        .map(Json)
        .map_err(|e| {
            warn!(subject_id = %subject_id, error = %e, "Progress lookup failed");
            map_error(e)
        })
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default)]
    pub metric: RankingMetric,
    #[serde(default)]
    pub window: RankingWindow,
}

/// GET /v1/leaderboard?metric=&window= — Ranked barbers.
pub async fn handle_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardOutcome>, ApiError> {
    metrics::counter!("api.leaderboard_requests").increment(1);
    state
        .facade
        .leaderboard(query.metric, query.window, Utc::now())
        .await
        .map(Json)
        .map_err(map_error)
}

#[derive(Debug, Deserialize)]
pub struct RequestRedemptionBody {
    pub subject_id: String,
    pub achievement_id: Uuid,
    pub actor: String,
}

/// POST /v1/redemptions/request — Flag intent to redeem an earned reward.
pub async fn handle_request_redemption(
    State(state): State<AppState>,
    Json(body): Json<RequestRedemptionBody>,
) -> Result<Json<RedemptionRecord>, ApiError> {
    state
        .engine
        .request_redemption(&body.subject_id, body.achievement_id, &body.actor)
        .map(Json)
        .map_err(map_error)
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRedemptionBody {
    pub subject_id: String,
    pub achievement_id: Uuid,
    pub actor: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// POST /v1/redemptions/confirm — Confirm a redemption handoff.
pub async fn handle_confirm_redemption(
    State(state): State<AppState>,
    Json(body): Json<ConfirmRedemptionBody>,
) -> Result<Json<RedemptionRecord>, ApiError> {
    let definition = state.catalog.get(&body.achievement_id).ok_or_else(|| {
        map_error(EngineError::NotFound(format!(
            "unknown achievement {}",
            body.achievement_id
        )))
    })?;
    state
        .engine
        .confirm_redemption(
            definition,
            &body.subject_id,
            &body.actor,
            body.notes.as_deref(),
        )
        .map(Json)
        .map_err(map_error)
}

/// GET /v1/redemptions/:subject_id/:achievement_id/history — Append-only
/// transition trail for one record.
pub async fn handle_redemption_history(
    State(state): State<AppState>,
    Path((subject_id, achievement_id)): Path<(String, Uuid)>,
) -> Json<Vec<TransitionEvent>> {
    Json(state.engine.audit_history(&subject_id, achievement_id))
}

// ─── Operational Endpoints ──────────────────────────────────────────────────

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
    if !state.catalog.is_empty() || state.start_time.elapsed().as_secs() > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /live — Liveness probe for Kubernetes.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}
