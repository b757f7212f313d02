//! PostgreSQL implementation of the persistence layer.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use super::models::{DAILY_METRIC_COLUMNS, UpsertOutcome};
use super::{AnalyticsStore, StatsStore};
use crate::config::AppConfig;
use crate::domain::field_mapping::{FieldMappingTable, FieldSpec, ValueKind};
use crate::domain::{
    DailyMetric, DateRange, EventKind, NewEvent, SnapshotScope, StatLine, StatSnapshotRecord,
    StatValue, SubscriptionTier,
};
use crate::error::AppError;

/// Identity and label columns of `player_stats`, in bind order.
const SNAPSHOT_IDENTITY_COLUMNS: &[&str] = &[
    "snapshot_date",
    "period_type",
    "room",
    "stake_category",
    "player_name",
    "site",
    "stake_label",
    "change_hash",
    "last_processed_at",
];

/// Bind parameters PostgreSQL accepts in one statement.
const BIND_LIMIT: usize = u16::MAX as usize;

/// Natural key of `player_stats`.
const SNAPSHOT_CONFLICT_TARGET: &str =
    "(snapshot_date, period_type, room, player_name, stake_category)";

/// PostgreSQL-backed persistence layer using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] if the database is unreachable
    /// within the configured timeout.
    pub async fn connect(config: &AppConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`AppError::PersistenceError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::PersistenceError(e.to_string()))
    }
}

fn numeric_specs() -> Vec<&'static FieldSpec> {
    FieldMappingTable::new().numeric_columns().collect()
}

/// Bind parameters per upserted row.
fn binds_per_snapshot() -> usize {
    SNAPSHOT_IDENTITY_COLUMNS.len() + FieldMappingTable::new().numeric_columns().count()
}

/// Builds the multi-row upsert for `records`.
fn build_snapshot_upsert<'a>(
    records: &'a [StatSnapshotRecord],
    numeric: &[&'static FieldSpec],
) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new("INSERT INTO player_stats (");
    qb.push(SNAPSHOT_IDENTITY_COLUMNS.join(", "));
    for spec in numeric {
        qb.push(", ").push(spec.column);
    }
    qb.push(") ");

    qb.push_values(records, |mut row, record| {
        row.push_bind(record.snapshot_date)
            .push_bind(record.period_type.as_str())
            .push_bind(record.room.as_str())
            .push_bind(record.stake_category.as_str())
            .push_bind(record.player_name.as_str())
            .push_bind(record.site.as_str())
            .push_bind(record.stake_label.as_str())
            .push_bind(record.change_hash.as_str())
            .push_bind(record.last_processed_at);
        for spec in numeric {
            match spec.kind {
                ValueKind::Count => row.push_bind(record.stats.count_or_zero(spec.column)),
                _ => row.push_bind(record.stats.f64_or_zero(spec.column)),
            };
        }
    });

    qb.push(" ON CONFLICT ")
        .push(SNAPSHOT_CONFLICT_TARGET)
        .push(" DO UPDATE SET ");
    for spec in numeric {
        qb.push(format!("{col} = EXCLUDED.{col}, ", col = spec.column));
    }
    qb.push(
        "change_hash = EXCLUDED.change_hash, \
         last_processed_at = EXCLUDED.last_processed_at \
         RETURNING (xmax = 0) AS inserted",
    );
    qb
}

fn snapshot_from_row(row: &PgRow, numeric: &[&'static FieldSpec]) -> Result<StatSnapshotRecord, AppError> {
    let period: String = row.try_get("period_type")?;
    let stake: String = row.try_get("stake_category")?;
    let mut stats = StatLine::new();
    for spec in numeric {
        let value = match spec.kind {
            ValueKind::Count => StatValue::Count(row.try_get::<i64, _>(spec.column)?),
            _ => StatValue::Amount(row.try_get::<f64, _>(spec.column)?),
        };
        stats.set(spec.column, value);
    }
    Ok(StatSnapshotRecord {
        snapshot_date: row.try_get("snapshot_date")?,
        period_type: period
            .parse()
            .map_err(|_| AppError::PersistenceError(format!("bad period_type '{period}'")))?,
        room: row.try_get("room")?,
        stake_category: stake.parse()?,
        player_name: row.try_get("player_name")?,
        site: row.try_get("site")?,
        stake_label: row.try_get("stake_label")?,
        stats,
        change_hash: row.try_get("change_hash")?,
        last_processed_at: row.try_get("last_processed_at")?,
    })
}

fn metric_from_row(row: &PgRow) -> Result<DailyMetric, AppError> {
    Ok(DailyMetric {
        date: row.try_get("date")?,
        total_users: row.try_get("total_users")?,
        new_registrations: row.try_get("new_registrations")?,
        active_users_7d: row.try_get("active_users_7d")?,
        active_users_30d: row.try_get("active_users_30d")?,
        paid_users: row.try_get("paid_users")?,
        mrr: row.try_get("mrr")?,
        player_searches: row.try_get("player_searches")?,
        ai_analyses: row.try_get("ai_analyses")?,
        new_subscriptions: row.try_get("new_subscriptions")?,
        cancelled_subscriptions: row.try_get("cancelled_subscriptions")?,
        avg_searches_per_user: row.try_get("avg_searches_per_user")?,
        conversion_rate: row.try_get("conversion_rate")?,
    })
}

#[async_trait]
impl StatsStore for PostgresPersistence {
    fn max_batch_rows(&self) -> usize {
        BIND_LIMIT / binds_per_snapshot()
    }

    async fn upsert_snapshots(
        &self,
        records: &[StatSnapshotRecord],
    ) -> Result<UpsertOutcome, AppError> {
        if records.is_empty() {
            return Ok(UpsertOutcome::default());
        }
        let numeric = numeric_specs();
        let mut qb = build_snapshot_upsert(records, &numeric);
        let flags: Vec<bool> = qb.build_query_scalar().fetch_all(&self.pool).await?;

        let inserted = flags.iter().filter(|inserted| **inserted).count() as u64;
        Ok(UpsertOutcome {
            inserted,
            updated: flags.len() as u64 - inserted,
        })
    }

    async fn fingerprints(
        &self,
        scope: &SnapshotScope,
        players: &[String],
    ) -> Result<HashMap<(String, String), String>, AppError> {
        let rows = sqlx::query_as::<_, (String, String, String)>(
            "SELECT room, player_name, change_hash FROM player_stats \
             WHERE snapshot_date = $1 AND period_type = $2 AND stake_category = $3 \
             AND player_name = ANY($4)",
        )
        .bind(scope.snapshot_date)
        .bind(scope.period_type.as_str())
        .bind(scope.stake_category.as_str())
        .bind(players)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(room, player, hash)| ((room, player), hash))
            .collect())
    }

    async fn player_snapshots(
        &self,
        room: &str,
        player_name: &str,
        range: Option<DateRange>,
    ) -> Result<Vec<StatSnapshotRecord>, AppError> {
        let rows = sqlx::query(
            "SELECT * FROM player_stats \
             WHERE room = $1 AND player_name = $2 \
             AND ($3::date IS NULL OR snapshot_date >= $3) \
             AND ($4::date IS NULL OR snapshot_date <= $4) \
             ORDER BY snapshot_date ASC",
        )
        .bind(room)
        .bind(player_name)
        .bind(range.map(|r| r.from))
        .bind(range.map(|r| r.to))
        .fetch_all(&self.pool)
        .await?;

        let numeric = numeric_specs();
        rows.iter()
            .map(|row| snapshot_from_row(row, &numeric))
            .collect()
    }

    async fn count_snapshots(&self, scope: &SnapshotScope) -> Result<u64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM player_stats \
             WHERE snapshot_date = $1 AND period_type = $2 AND stake_category = $3",
        )
        .bind(scope.snapshot_date)
        .bind(scope.period_type.as_str())
        .bind(scope.stake_category.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl AnalyticsStore for PostgresPersistence {
    async fn append_event(&self, event: &NewEvent) -> Result<i64, AppError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO events (user_id, event_type, payload, ip_address, user_agent, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(event.user_id)
        .bind(event.kind.as_str())
        .bind(&event.payload)
        .bind(event.ip_address.as_deref())
        .bind(event.user_agent.as_deref())
        .bind(event.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn count_accounts_created(
        &self,
        start: Option<DateTime<Utc>>,
        end: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users \
             WHERE ($1::timestamptz IS NULL OR created_at >= $1) AND created_at < $2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn count_paid_accounts(&self, as_of: DateTime<Utc>) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users \
             WHERE subscription_tier = ANY($1) \
             AND (subscription_expires_at IS NULL OR subscription_expires_at > $2)",
        )
        .bind(SubscriptionTier::paid_tiers())
        .bind(as_of)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn count_events(
        &self,
        kind: EventKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM events \
             WHERE event_type = $1 AND created_at >= $2 AND created_at < $3",
        )
        .bind(kind.as_str())
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn count_distinct_users(
        &self,
        kind: EventKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT user_id) FROM events \
             WHERE event_type = $1 AND created_at >= $2 AND created_at < $3",
        )
        .bind(kind.as_str())
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn save_daily_metric(&self, metric: &DailyMetric) -> Result<(), AppError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("INSERT INTO daily_metrics (");
        qb.push(DAILY_METRIC_COLUMNS.join(", "));
        qb.push(") VALUES (");
        qb.separated(", ")
            .push_bind(metric.date)
            .push_bind(metric.total_users)
            .push_bind(metric.new_registrations)
            .push_bind(metric.active_users_7d)
            .push_bind(metric.active_users_30d)
            .push_bind(metric.paid_users)
            .push_bind(metric.mrr)
            .push_bind(metric.player_searches)
            .push_bind(metric.ai_analyses)
            .push_bind(metric.new_subscriptions)
            .push_bind(metric.cancelled_subscriptions)
            .push_bind(metric.avg_searches_per_user)
            .push_bind(metric.conversion_rate);
        qb.push(") ON CONFLICT (date) DO UPDATE SET ");
        for column in DAILY_METRIC_COLUMNS.iter().filter(|c| **c != "date") {
            qb.push(format!("{column} = EXCLUDED.{column}, "));
        }
        qb.push("updated_at = now()");

        qb.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn daily_metric(&self, date: NaiveDate) -> Result<Option<DailyMetric>, AppError> {
        let row = sqlx::query("SELECT * FROM daily_metrics WHERE date = $1")
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(metric_from_row).transpose()
    }

    async fn recent_daily_metrics(&self, limit: u32) -> Result<Vec<DailyMetric>, AppError> {
        let rows = sqlx::query("SELECT * FROM daily_metrics ORDER BY date DESC LIMIT $1")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(metric_from_row).collect()
    }
}
