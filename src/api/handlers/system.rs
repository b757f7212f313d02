//! System endpoints: health check and the stat field catalogue.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::{StatFieldCatalog, StatFieldDto};
use crate::app_state::AppState;
use crate::domain::field_mapping::REQUIRED_COLUMNS;
use crate::domain::FieldMappingTable;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /config/stat-fields` — List accepted upload headers.
#[utoipa::path(
    get,
    path = "/config/stat-fields",
    tag = "System",
    summary = "List stat fields",
    description = "Returns every header the upload parser accepts, the internal column it maps to, its group and coercion rule, and which columns are required.",
    responses(
        (status = 200, description = "Stat field catalogue", body = StatFieldCatalog),
    )
)]
pub async fn stat_fields_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(stat_field_catalog()))
}

fn stat_field_catalog() -> StatFieldCatalog {
    let table = FieldMappingTable::new();
    let fields = table
        .specs()
        .iter()
        .map(|spec| StatFieldDto {
            header: spec.header,
            column: spec.column,
            label: spec.label(),
            group: spec.group,
            kind: spec.kind,
            required: REQUIRED_COLUMNS.contains(&spec.column),
            alias: table
                .canonical(spec.column)
                .is_some_and(|canonical| canonical.header != spec.header),
        })
        .collect();
    StatFieldCatalog {
        required_headers: table.required_headers(),
        fields,
    }
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/stat-fields", get(stat_fields_handler))
}
