//! Persistence layer: player statistics, the event log, accounts, and
//! daily metrics.
//!
//! Two storage seams are defined as traits so services stay independent
//! of the backend:
//!
//! - [`StatsStore`]: idempotent snapshot upserts and per-player reads.
//! - [`AnalyticsStore`]: event log, account counts, and daily metric rows.
//!
//! [`postgres::PostgresPersistence`] implements both over `sqlx::PgPool`;
//! [`memory::MemoryPersistence`] implements both in process for development
//! and tests.

pub mod memory;
pub mod models;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{DailyMetric, DateRange, EventKind, NewEvent, SnapshotScope, StatSnapshotRecord};
use crate::error::AppError;

pub use memory::MemoryPersistence;
pub use models::UpsertOutcome;
pub use postgres::PostgresPersistence;

/// Storage of [`StatSnapshotRecord`] rows keyed by their natural key.
#[async_trait]
pub trait StatsStore: Send + Sync + std::fmt::Debug {
    /// Largest number of records one [`Self::upsert_snapshots`] call can
    /// take. Unbounded unless the backend limits statement size.
    fn max_batch_rows(&self) -> usize {
        usize::MAX
    }

    /// Inserts or updates `records` in one statement. On conflict only the
    /// numeric statistics, the fingerprint and the refresh timestamp change.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] if the write fails; no row of
    /// the batch is written in that case.
    async fn upsert_snapshots(
        &self,
        records: &[StatSnapshotRecord],
    ) -> Result<UpsertOutcome, AppError>;

    /// Stored fingerprints within `scope` for the given players, keyed by
    /// `(room, player_name)`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] on read failure.
    async fn fingerprints(
        &self,
        scope: &SnapshotScope,
        players: &[String],
    ) -> Result<HashMap<(String, String), String>, AppError>;

    /// All snapshots of one player in one room, optionally limited to a date
    /// range, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] on read failure.
    async fn player_snapshots(
        &self,
        room: &str,
        player_name: &str,
        range: Option<DateRange>,
    ) -> Result<Vec<StatSnapshotRecord>, AppError>;

    /// Number of rows stored within `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] on read failure.
    async fn count_snapshots(&self, scope: &SnapshotScope) -> Result<u64, AppError>;
}

/// Event log, account registry reads, and daily metric rows.
///
/// Time bounds are half-open: `start` inclusive, `end` exclusive.
#[async_trait]
pub trait AnalyticsStore: Send + Sync + std::fmt::Debug {
    /// Appends one event and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] on write failure.
    async fn append_event(&self, event: &NewEvent) -> Result<i64, AppError>;

    /// Accounts created in `[start, end)`; `None` start means unbounded.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] on read failure.
    async fn count_accounts_created(
        &self,
        start: Option<DateTime<Utc>>,
        end: DateTime<Utc>,
    ) -> Result<i64, AppError>;

    /// Accounts on a paid tier whose expiry is unset or later than `as_of`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] on read failure.
    async fn count_paid_accounts(&self, as_of: DateTime<Utc>) -> Result<i64, AppError>;

    /// Events of `kind` in `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] on read failure.
    async fn count_events(
        &self,
        kind: EventKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, AppError>;

    /// Distinct users with an event of `kind` in `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] on read failure.
    async fn count_distinct_users(
        &self,
        kind: EventKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, AppError>;

    /// Stores `metric`, replacing any row for the same date.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] on write failure.
    async fn save_daily_metric(&self, metric: &DailyMetric) -> Result<(), AppError>;

    /// The row for `date`, if computed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] on read failure.
    async fn daily_metric(&self, date: NaiveDate) -> Result<Option<DailyMetric>, AppError>;

    /// Up to `limit` most recent rows, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] on read failure.
    async fn recent_daily_metrics(&self, limit: u32) -> Result<Vec<DailyMetric>, AppError>;
}
