//! Database models and write outcomes.

use serde::Serialize;

/// Row counts reported by a batch upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertOutcome {
    /// Rows whose natural key was new.
    pub inserted: u64,
    /// Rows that replaced an existing row.
    pub updated: u64,
}

impl UpsertOutcome {
    /// Total rows written.
    #[must_use]
    pub const fn written(&self) -> u64 {
        self.inserted + self.updated
    }
}

/// Column list of the `daily_metrics` table, in bind order.
pub const DAILY_METRIC_COLUMNS: &[&str] = &[
    "date",
    "total_users",
    "new_registrations",
    "active_users_7d",
    "active_users_30d",
    "paid_users",
    "mrr",
    "player_searches",
    "ai_analyses",
    "new_subscriptions",
    "cancelled_subscriptions",
    "avg_searches_per_user",
    "conversion_rate",
];
