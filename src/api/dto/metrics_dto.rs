//! Metrics and event log DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::{DailyMetric, EventKind};

/// Query parameters of `POST /metrics/backfill`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BackfillQuery {
    /// Number of trailing days to recompute, ending on `end`.
    #[serde(default = "default_backfill_days")]
    pub days: u32,
    /// Last date recomputed, `YYYY-MM-DD` (defaults to today UTC).
    #[serde(default)]
    pub end: Option<String>,
}

fn default_backfill_days() -> u32 {
    7
}

/// Response of `POST /metrics/backfill`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BackfillResponse {
    /// Dates recomputed.
    pub days: usize,
    /// Rows written, oldest first.
    pub metrics: Vec<DailyMetric>,
}

/// Query parameters of `GET /metrics/daily`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecentQuery {
    /// Maximum rows returned, newest first. Defaults to 30.
    #[serde(default = "default_recent_limit")]
    pub limit: u32,
}

fn default_recent_limit() -> u32 {
    30
}

/// Request body of `POST /events`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RecordEventRequest {
    /// Acting user, if known.
    #[serde(default)]
    pub user_id: Option<Uuid>,
    /// Event type.
    pub event_type: EventKind,
    /// Free-form structured payload.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
}

/// Response of `POST /events` (201 Created).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecordEventResponse {
    /// Identifier assigned by the event log.
    pub id: i64,
    /// Event type echoed from the request.
    pub event_type: EventKind,
}
