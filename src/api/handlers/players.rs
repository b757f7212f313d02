//! Player report and cache handlers.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::PlayerRangeQuery;
use crate::app_state::AppState;
use crate::domain::{EventKind, NewEvent, PlayerReport};
use crate::error::{AppError, ErrorResponse};

/// `GET /players/{room}/{player}` — Aggregated report for one player.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] if the player has no snapshots in the
/// room, or [`AppError::InvalidRequest`] for a malformed date filter.
#[utoipa::path(
    get,
    path = "/api/v1/players/{room}/{player}",
    tag = "Players",
    summary = "Get player report",
    description = "Returns the latest snapshot per period and stake together with hand-weighted headline figures. Results are cached; range-filtered queries expire sooner than all-time ones.",
    params(
        ("room" = String, Path, description = "Room code or site label"),
        ("player" = String, Path, description = "Player name"),
        PlayerRangeQuery,
    ),
    responses(
        (status = 200, description = "Player report", body = serde_json::Value),
        (status = 400, description = "Invalid date filter", body = ErrorResponse),
        (status = 404, description = "Player not found", body = ErrorResponse),
    )
)]
pub async fn get_player(
    State(state): State<AppState>,
    Path((room, player)): Path<(String, String)>,
    Query(query): Query<PlayerRangeQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let range = query.range()?;
    let report = state
        .player_service
        .player_report(&room, &player, range)
        .await?;

    let search = NewEvent {
        user_id: None,
        kind: EventKind::PlayerSearch,
        payload: serde_json::json!({ "room": report.room, "player_name": report.player_name }),
        ip_address: None,
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        created_at: Utc::now(),
    };
    if let Err(err) = state.metrics_service.record_event(search).await {
        tracing::warn!(error = %err, "failed to record player search");
    }

    Ok(Json(PlayerReport::clone(&report)))
}

/// `DELETE /cache` — Drop every cached player report.
#[utoipa::path(
    delete,
    path = "/api/v1/cache",
    tag = "Players",
    summary = "Clear player cache",
    responses(
        (status = 204, description = "Cache cleared"),
    )
)]
pub async fn clear_cache(State(state): State<AppState>) -> impl IntoResponse {
    state.player_service.clear_cache();
    StatusCode::NO_CONTENT
}

/// Player routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/players/{room}/{player}", get(get_player))
        .route("/cache", delete(clear_cache))
}
