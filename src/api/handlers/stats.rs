//! Statistics upload handler.

use axum::extract::{DefaultBodyLimit, Query, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::UploadQuery;
use crate::app_state::AppState;
use crate::error::{AppError, ErrorResponse};
use crate::ingest::IngestSummary;
use crate::service::IngestService;

/// Largest accepted upload body.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// `POST /stats/upload` — Ingest a delimited statistics file.
///
/// # Errors
///
/// Returns [`AppError`] on invalid parameters, an empty upload, or missing
/// required headers. Row-level problems are reported in the summary.
#[utoipa::path(
    post,
    path = "/api/v1/stats/upload",
    tag = "Stats",
    summary = "Upload a statistics file",
    description = "Parses the request body as delimited text (header line first), validates every row, and upserts accepted rows in batches. Uploading the same file twice leaves the store unchanged apart from refresh timestamps.",
    params(UploadQuery),
    request_body(content = String, content_type = "text/csv"),
    responses(
        (status = 200, description = "Upload processed", body = IngestSummary),
        (status = 400, description = "Invalid parameters or header", body = ErrorResponse),
    )
)]
pub async fn upload_stats(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let scope = IngestService::parse_scope(
        query.period_type.as_deref(),
        query.snapshot_date.as_deref(),
        query.stake.as_deref(),
    )?;
    let summary = state.ingest_service.ingest(&body, &scope).await?;
    Ok(Json(summary))
}

/// Upload routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stats/upload", post(upload_stats))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
