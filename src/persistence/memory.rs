//! In-process implementation of both storage traits.
//!
//! Used when `PERSISTENCE_ENABLED=false` and by tests. Mirrors the
//! PostgreSQL conflict rules so behaviour is identical across backends.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use super::models::UpsertOutcome;
use super::{AnalyticsStore, StatsStore};
use crate::domain::{
    Account, DailyMetric, DateRange, EventKind, NewEvent, SnapshotKey, SnapshotScope,
    StatSnapshotRecord,
};
use crate::error::AppError;

/// Memory-backed persistence.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    snapshots: RwLock<BTreeMap<SnapshotKey, StatSnapshotRecord>>,
    accounts: RwLock<Vec<Account>>,
    events: RwLock<Vec<NewEvent>>,
    metrics: RwLock<BTreeMap<NaiveDate, DailyMetric>>,
}

impl MemoryPersistence {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account. Accounts are owned by the sign-up flow; this
    /// store only reads them for metrics.
    pub async fn insert_account(&self, account: Account) {
        self.accounts.write().await.push(account);
    }

    /// Total stored snapshot rows.
    pub async fn snapshot_len(&self) -> usize {
        self.snapshots.read().await.len()
    }
}

#[async_trait]
impl StatsStore for MemoryPersistence {
    async fn upsert_snapshots(
        &self,
        records: &[StatSnapshotRecord],
    ) -> Result<UpsertOutcome, AppError> {
        let mut map = self.snapshots.write().await;
        let mut outcome = UpsertOutcome::default();
        for record in records {
            match map.get_mut(&record.key()) {
                Some(existing) => {
                    existing.stats = record.stats.clone();
                    existing.change_hash.clone_from(&record.change_hash);
                    existing.last_processed_at = record.last_processed_at;
                    outcome.updated += 1;
                }
                None => {
                    map.insert(record.key(), record.clone());
                    outcome.inserted += 1;
                }
            }
        }
        Ok(outcome)
    }

    async fn fingerprints(
        &self,
        scope: &SnapshotScope,
        players: &[String],
    ) -> Result<HashMap<(String, String), String>, AppError> {
        let map = self.snapshots.read().await;
        Ok(map
            .values()
            .filter(|r| in_scope(r, scope) && players.contains(&r.player_name))
            .map(|r| ((r.room.clone(), r.player_name.clone()), r.change_hash.clone()))
            .collect())
    }

    async fn player_snapshots(
        &self,
        room: &str,
        player_name: &str,
        range: Option<DateRange>,
    ) -> Result<Vec<StatSnapshotRecord>, AppError> {
        let map = self.snapshots.read().await;
        let mut rows: Vec<StatSnapshotRecord> = map
            .values()
            .filter(|r| r.room == room && r.player_name == player_name)
            .filter(|r| range.is_none_or(|range| range.contains(r.snapshot_date)))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.snapshot_date);
        Ok(rows)
    }

    async fn count_snapshots(&self, scope: &SnapshotScope) -> Result<u64, AppError> {
        let map = self.snapshots.read().await;
        Ok(map.values().filter(|r| in_scope(r, scope)).count() as u64)
    }
}

fn in_scope(record: &StatSnapshotRecord, scope: &SnapshotScope) -> bool {
    record.snapshot_date == scope.snapshot_date
        && record.period_type == scope.period_type
        && record.stake_category == scope.stake_category
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[async_trait]
impl AnalyticsStore for MemoryPersistence {
    async fn append_event(&self, event: &NewEvent) -> Result<i64, AppError> {
        let mut events = self.events.write().await;
        events.push(event.clone());
        Ok(to_i64(events.len()))
    }

    async fn count_accounts_created(
        &self,
        start: Option<DateTime<Utc>>,
        end: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let accounts = self.accounts.read().await;
        Ok(to_i64(
            accounts
                .iter()
                .filter(|a| start.is_none_or(|s| a.created_at >= s) && a.created_at < end)
                .count(),
        ))
    }

    async fn count_paid_accounts(&self, as_of: DateTime<Utc>) -> Result<i64, AppError> {
        let accounts = self.accounts.read().await;
        Ok(to_i64(
            accounts
                .iter()
                .filter(|a| a.tier.is_paid())
                .filter(|a| a.subscription_expires_at.is_none_or(|exp| exp > as_of))
                .count(),
        ))
    }

    async fn count_events(
        &self,
        kind: EventKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let events = self.events.read().await;
        Ok(to_i64(
            events
                .iter()
                .filter(|e| e.kind == kind && e.created_at >= start && e.created_at < end)
                .count(),
        ))
    }

    async fn count_distinct_users(
        &self,
        kind: EventKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let events = self.events.read().await;
        let mut users: Vec<_> = events
            .iter()
            .filter(|e| e.kind == kind && e.created_at >= start && e.created_at < end)
            .filter_map(|e| e.user_id)
            .collect();
        users.sort_unstable();
        users.dedup();
        Ok(to_i64(users.len()))
    }

    async fn save_daily_metric(&self, metric: &DailyMetric) -> Result<(), AppError> {
        self.metrics.write().await.insert(metric.date, metric.clone());
        Ok(())
    }

    async fn daily_metric(&self, date: NaiveDate) -> Result<Option<DailyMetric>, AppError> {
        Ok(self.metrics.read().await.get(&date).cloned())
    }

    async fn recent_daily_metrics(&self, limit: u32) -> Result<Vec<DailyMetric>, AppError> {
        let metrics = self.metrics.read().await;
        Ok(metrics
            .values()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{PeriodType, StakeCategory, StatLine, StatValue};

    fn record(player: &str, hands: i64) -> StatSnapshotRecord {
        let Some(date) = NaiveDate::from_ymd_opt(2024, 3, 3) else {
            panic!("valid date");
        };
        let mut stats = StatLine::new();
        stats.set("hands", StatValue::Count(hands));
        StatSnapshotRecord {
            snapshot_date: date,
            period_type: PeriodType::Month,
            room: "GG".to_string(),
            stake_category: StakeCategory::Low,
            player_name: player.to_string(),
            site: "GGPoker".to_string(),
            stake_label: "NL25".to_string(),
            stats,
            change_hash: format!("{hands:08x}"),
            last_processed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_updates_existing_key() {
        let store = MemoryPersistence::new();
        let first = store.upsert_snapshots(&[record("a", 10), record("b", 20)]).await;
        assert_eq!(first.ok(), Some(UpsertOutcome { inserted: 2, updated: 0 }));

        let mut changed = record("a", 99);
        changed.site = "renamed".to_string();
        let second = store.upsert_snapshots(&[changed]).await;
        assert_eq!(second.ok(), Some(UpsertOutcome { inserted: 0, updated: 1 }));
        assert_eq!(store.snapshot_len().await, 2);

        let Ok(rows) = store.player_snapshots("GG", "a", None).await else {
            panic!("read failed");
        };
        assert_eq!(rows.len(), 1);
        let Some(row) = rows.first() else {
            panic!("row present");
        };
        assert_eq!(row.hands(), 99);
        assert_eq!(row.site, "GGPoker");
    }

    #[tokio::test]
    async fn metric_rows_replace_by_date() {
        let store = MemoryPersistence::new();
        let Some(date) = NaiveDate::from_ymd_opt(2024, 3, 3) else {
            panic!("valid date");
        };
        let mut metric = DailyMetric::from_counts(date, Default::default(), 1.0);
        let _ = store.save_daily_metric(&metric).await;
        metric.total_users = 5;
        let _ = store.save_daily_metric(&metric).await;
        let Ok(recent) = store.recent_daily_metrics(10).await else {
            panic!("read failed");
        };
        assert_eq!(recent.len(), 1);
        assert_eq!(recent.first().map(|m| m.total_users), Some(5));
    }
}
