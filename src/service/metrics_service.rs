//! Daily metric aggregation, backfill, growth comparison, and event
//! recording.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};

use crate::domain::growth::{self, GrowthComparison};
use crate::domain::metrics::{DayWindow, midnight};
use crate::domain::{DailyMetric, EventKind, MetricCounts, NewEvent};
use crate::error::AppError;
use crate::persistence::AnalyticsStore;

/// Longest backfill accepted in one call.
pub const MAX_BACKFILL_DAYS: u32 = 366;

/// Largest page of daily rows returned by [`MetricsService::recent`].
pub const MAX_RECENT_LIMIT: u32 = 365;

/// Computes and reads [`DailyMetric`] rows.
#[derive(Debug, Clone)]
pub struct MetricsService {
    store: Arc<dyn AnalyticsStore>,
    seat_price: f64,
    lookback_days: u32,
}

impl MetricsService {
    /// Creates a service over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn AnalyticsStore>, seat_price: f64, lookback_days: u32) -> Self {
        Self {
            store,
            seat_price,
            lookback_days: lookback_days.max(1),
        }
    }

    /// Gathers the raw counts for `date`.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if any source read fails.
    pub async fn gather_counts(&self, date: NaiveDate) -> Result<MetricCounts, AppError> {
        let day = DayWindow::day(date);
        let week = DayWindow::trailing(date, 7);
        let month = DayWindow::trailing(date, 30);
        let store = &self.store;

        Ok(MetricCounts {
            total_users: store.count_accounts_created(None, day.end).await?,
            new_registrations: store.count_accounts_created(Some(day.start), day.end).await?,
            active_users_7d: store
                .count_distinct_users(EventKind::Login, week.start, week.end)
                .await?,
            active_users_30d: store
                .count_distinct_users(EventKind::Login, month.start, month.end)
                .await?,
            paid_users: store.count_paid_accounts(midnight(date)).await?,
            player_searches: store
                .count_events(EventKind::PlayerSearch, day.start, day.end)
                .await?,
            ai_analyses: store
                .count_events(EventKind::AiAnalysisRequest, day.start, day.end)
                .await?,
            new_subscriptions: store
                .count_events(EventKind::SubscriptionActivated, day.start, day.end)
                .await?,
            cancelled_subscriptions: store
                .count_events(EventKind::SubscriptionCancelled, day.start, day.end)
                .await?,
        })
    }

    /// Computes and stores the row for `date` (today, UTC, when `None`).
    /// Re-running for the same date replaces the row.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if a read or the final write fails.
    pub async fn calculate_daily_metrics(
        &self,
        date: Option<NaiveDate>,
    ) -> Result<DailyMetric, AppError> {
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        let counts = self.gather_counts(date).await?;
        let metric = DailyMetric::from_counts(date, counts, self.seat_price);
        self.store.save_daily_metric(&metric).await?;
        tracing::info!(
            %date,
            total_users = metric.total_users,
            paid_users = metric.paid_users,
            active_users_7d = metric.active_users_7d,
            "daily metrics calculated"
        );
        Ok(metric)
    }

    /// Recomputes the `days` dates ending on `end`, oldest first, one date
    /// at a time. Stops at the first failure; dates already computed stay
    /// stored.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] if `days` is 0 or above
    /// [`MAX_BACKFILL_DAYS`], or the error of the first failing date.
    pub async fn backfill(&self, days: u32, end: NaiveDate) -> Result<Vec<DailyMetric>, AppError> {
        if days == 0 || days > MAX_BACKFILL_DAYS {
            return Err(AppError::InvalidRequest(format!(
                "days must be between 1 and {MAX_BACKFILL_DAYS}"
            )));
        }
        let mut computed = Vec::with_capacity(days as usize);
        for offset in (0..u64::from(days)).rev() {
            let Some(date) = end.checked_sub_days(Days::new(offset)) else {
                continue;
            };
            match self.calculate_daily_metrics(Some(date)).await {
                Ok(metric) => computed.push(metric),
                Err(err) => {
                    tracing::warn!(%date, done = computed.len(), error = %err, "backfill stopped");
                    return Err(err);
                }
            }
        }
        tracing::info!(days, %end, "metrics backfill complete");
        Ok(computed)
    }

    /// Compares `date` (today when `None`) with the row the configured
    /// lookback earlier.
    ///
    /// # Errors
    ///
    /// Returns a persistence error on read failure. Missing rows are a
    /// [`GrowthComparison::InsufficientData`] result, not an error.
    pub async fn growth(&self, date: Option<NaiveDate>) -> Result<GrowthComparison, AppError> {
        let current_date = date.unwrap_or_else(|| Utc::now().date_naive());
        let previous_date = current_date
            .checked_sub_days(Days::new(u64::from(self.lookback_days)))
            .unwrap_or(NaiveDate::MIN);
        let current = self.store.daily_metric(current_date).await?;
        let previous = self.store.daily_metric(previous_date).await?;
        Ok(growth::compare(
            current_date,
            previous_date,
            current.as_ref(),
            previous.as_ref(),
        ))
    }

    /// Most recent rows, newest first. `limit` is clamped to
    /// `1..=MAX_RECENT_LIMIT`.
    ///
    /// # Errors
    ///
    /// Returns a persistence error on read failure.
    pub async fn recent(&self, limit: u32) -> Result<Vec<DailyMetric>, AppError> {
        self.store
            .recent_daily_metrics(limit.clamp(1, MAX_RECENT_LIMIT))
            .await
    }

    /// Appends `event` to the log and returns its id.
    ///
    /// # Errors
    ///
    /// Returns a persistence error on write failure.
    pub async fn record_event(&self, event: NewEvent) -> Result<i64, AppError> {
        let id = self.store.append_event(&event).await?;
        tracing::debug!(id, kind = %event.kind, "event recorded");
        Ok(id)
    }
}
