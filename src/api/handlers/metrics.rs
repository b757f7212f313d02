//! Daily metrics and event log handlers.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{
    BackfillQuery, BackfillResponse, DateQuery, RecentQuery, RecordEventRequest,
    RecordEventResponse, parse_date,
};
use crate::app_state::AppState;
use crate::domain::{DailyMetric, GrowthComparison, NewEvent};
use crate::error::{AppError, ErrorResponse};

/// `POST /metrics/calculate` — Compute one day's metrics.
///
/// # Errors
///
/// Returns [`AppError`] on a malformed date or a store failure.
#[utoipa::path(
    post,
    path = "/api/v1/metrics/calculate",
    tag = "Metrics",
    summary = "Calculate daily metrics",
    description = "Computes and stores the metric row for the date (today when omitted). Re-running replaces the row.",
    params(DateQuery),
    responses(
        (status = 200, description = "Stored metric row", body = DailyMetric),
        (status = 400, description = "Invalid date", body = ErrorResponse),
    )
)]
pub async fn calculate(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<impl IntoResponse, AppError> {
    let metric = state
        .metrics_service
        .calculate_daily_metrics(query.parsed()?)
        .await?;
    Ok(Json(metric))
}

/// `POST /metrics/backfill` — Recompute trailing days.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] for an out-of-range `days`, or the
/// first failing date's error.
#[utoipa::path(
    post,
    path = "/api/v1/metrics/backfill",
    tag = "Metrics",
    summary = "Backfill daily metrics",
    description = "Recomputes `days` dates ending on `end`, one date at a time, oldest first. Stops at the first failure.",
    params(BackfillQuery),
    responses(
        (status = 200, description = "Rows recomputed", body = BackfillResponse),
        (status = 400, description = "Invalid parameters", body = ErrorResponse),
    )
)]
pub async fn backfill(
    State(state): State<AppState>,
    Query(query): Query<BackfillQuery>,
) -> Result<impl IntoResponse, AppError> {
    let end = parse_date("end", query.end.as_deref())?.unwrap_or_else(|| Utc::now().date_naive());
    let metrics = state.metrics_service.backfill(query.days, end).await?;
    Ok(Json(BackfillResponse {
        days: metrics.len(),
        metrics,
    }))
}

/// `GET /metrics/growth` — Compare a date with the lookback date.
///
/// # Errors
///
/// Returns [`AppError`] on a malformed date or a store failure.
#[utoipa::path(
    get,
    path = "/api/v1/metrics/growth",
    tag = "Metrics",
    summary = "Growth report",
    description = "Percentage change of every tracked field between the date and the configured number of days earlier. Reports `insufficient_data` with the missing dates when either row is absent.",
    params(DateQuery),
    responses(
        (status = 200, description = "Growth comparison", body = GrowthComparison),
        (status = 400, description = "Invalid date", body = ErrorResponse),
    )
)]
pub async fn growth(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<impl IntoResponse, AppError> {
    let comparison = state.metrics_service.growth(query.parsed()?).await?;
    Ok(Json(comparison))
}

/// `GET /metrics/daily` — Most recent metric rows.
///
/// # Errors
///
/// Returns [`AppError`] on a store failure.
#[utoipa::path(
    get,
    path = "/api/v1/metrics/daily",
    tag = "Metrics",
    summary = "Recent daily metrics",
    params(RecentQuery),
    responses(
        (status = 200, description = "Rows, newest first", body = Vec<DailyMetric>),
    )
)]
pub async fn recent(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state.metrics_service.recent(query.limit).await?;
    Ok(Json(rows))
}

/// `POST /events` — Append an event to the log.
///
/// # Errors
///
/// Returns [`AppError`] on a store failure.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Record an event",
    request_body = RecordEventRequest,
    responses(
        (status = 201, description = "Event recorded", body = RecordEventResponse),
        (status = 422, description = "Unknown event type or malformed body"),
    )
)]
pub async fn record_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RecordEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let ip_address = header_value("x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .or_else(|| header_value("x-real-ip"));

    let event = NewEvent {
        user_id: req.user_id,
        kind: req.event_type,
        payload: req.payload,
        ip_address,
        user_agent: header_value(header::USER_AGENT.as_str()),
        created_at: Utc::now(),
    };
    let id = state.metrics_service.record_event(event).await?;
    Ok((
        StatusCode::CREATED,
        Json(RecordEventResponse {
            id,
            event_type: req.event_type,
        }),
    ))
}

/// Metrics and event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/metrics/calculate", post(calculate))
        .route("/metrics/backfill", post(backfill))
        .route("/metrics/growth", get(growth))
        .route("/metrics/daily", get(recent))
        .route("/events", post(record_event))
}
