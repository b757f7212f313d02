//! Upload orchestration: parameter validation, pipeline run, cache
//! invalidation.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::cache::PlayerCache;
use crate::domain::{PeriodType, SnapshotScope};
use crate::error::AppError;
use crate::ingest::{IngestPipeline, IngestSummary};

/// Date format of the `snapshot_date` upload parameter.
pub const SNAPSHOT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Entry point for statistics uploads.
#[derive(Debug, Clone)]
pub struct IngestService {
    pipeline: IngestPipeline,
    cache: Arc<PlayerCache>,
}

impl IngestService {
    /// Creates a service running `pipeline` and invalidating `cache`.
    #[must_use]
    pub fn new(pipeline: IngestPipeline, cache: Arc<PlayerCache>) -> Self {
        Self { pipeline, cache }
    }

    /// Validates the upload parameters into a [`SnapshotScope`].
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] when a parameter is missing or
    /// blank, the date is not `YYYY-MM-DD`, the period type is unknown, or
    /// the stake label carries no numeric level.
    pub fn parse_scope(
        period_type: Option<&str>,
        snapshot_date: Option<&str>,
        stake: Option<&str>,
    ) -> Result<SnapshotScope, AppError> {
        let period_type = required("period_type", period_type)?;
        let snapshot_date = required("snapshot_date", snapshot_date)?;
        let stake = required("stake", stake)?;

        let date = NaiveDate::parse_from_str(snapshot_date, SNAPSHOT_DATE_FORMAT).map_err(|_| {
            AppError::InvalidRequest(format!(
                "snapshot_date '{snapshot_date}' is not a YYYY-MM-DD date"
            ))
        })?;
        let period: PeriodType = period_type.parse()?;
        SnapshotScope::new(date, period, stake)
    }

    /// Ingests `text` under `scope`. When any row was written, cached
    /// player reports are dropped so reads observe the new data.
    ///
    /// # Errors
    ///
    /// Propagates structural failures from [`IngestPipeline::run`].
    pub async fn ingest(&self, text: &str, scope: &SnapshotScope) -> Result<IngestSummary, AppError> {
        let summary = self.pipeline.run(text, scope).await?;
        if summary.processed > 0 {
            self.cache.clear();
            tracing::debug!("player cache cleared after upload");
        }
        Ok(summary)
    }
}

fn required<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str, AppError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::InvalidRequest(format!(
            "missing required parameter '{name}'"
        ))),
    }
}
