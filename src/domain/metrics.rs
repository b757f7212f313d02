//! Business metrics: accounts, the append-only event log, and the
//! per-day aggregate row derived from them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

/// Closed set of event types written to the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// User signed in.
    Login,
    /// Account created.
    Registration,
    /// Player lookup performed.
    PlayerSearch,
    /// AI analysis requested.
    AiAnalysisRequest,
    /// Paid subscription started.
    SubscriptionActivated,
    /// Paid subscription cancelled.
    SubscriptionCancelled,
    /// Player added to favourites.
    FavoriteAdded,
    /// Player removed from favourites.
    FavoriteRemoved,
}

impl EventKind {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Registration => "registration",
            Self::PlayerSearch => "player_search",
            Self::AiAnalysisRequest => "ai_analysis_request",
            Self::SubscriptionActivated => "subscription_activated",
            Self::SubscriptionCancelled => "subscription_cancelled",
            Self::FavoriteAdded => "favorite_added",
            Self::FavoriteRemoved => "favorite_removed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(Self::Login),
            "registration" => Ok(Self::Registration),
            "player_search" => Ok(Self::PlayerSearch),
            "ai_analysis_request" => Ok(Self::AiAnalysisRequest),
            "subscription_activated" => Ok(Self::SubscriptionActivated),
            "subscription_cancelled" => Ok(Self::SubscriptionCancelled),
            "favorite_added" => Ok(Self::FavoriteAdded),
            "favorite_removed" => Ok(Self::FavoriteRemoved),
            other => Err(AppError::InvalidRequest(format!("unknown event type '{other}'"))),
        }
    }
}

/// An event about to be appended to the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Acting user, if known.
    pub user_id: Option<Uuid>,
    /// Event type.
    pub kind: EventKind,
    /// Free-form structured payload.
    pub payload: serde_json::Value,
    /// Client network address.
    pub ip_address: Option<String>,
    /// Client user-agent string.
    pub user_agent: Option<String>,
    /// Event time.
    pub created_at: DateTime<Utc>,
}

/// Subscription tier of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    /// No subscription.
    Free,
    /// Paid entry tier.
    Pro,
    /// Paid top tier.
    Premium,
}

impl SubscriptionTier {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Premium => "premium",
        }
    }

    /// Whether the tier is billed.
    #[must_use]
    pub const fn is_paid(self) -> bool {
        !matches!(self, Self::Free)
    }

    /// Storage values of every billed tier.
    #[must_use]
    pub fn paid_tiers() -> Vec<String> {
        [Self::Pro, Self::Premium]
            .iter()
            .map(|tier| tier.as_str().to_string())
            .collect()
    }
}

/// The slice of an account record that metrics read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier.
    pub id: Uuid,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Current tier.
    pub tier: SubscriptionTier,
    /// Paid access end, `None` for open-ended.
    pub subscription_expires_at: Option<DateTime<Utc>>,
}

/// Half-open UTC interval `[start, end)` covering whole calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    /// Inclusive start (midnight of the first day).
    pub start: DateTime<Utc>,
    /// Exclusive end (midnight after the last day).
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// Window covering `date` alone.
    #[must_use]
    pub fn day(date: NaiveDate) -> Self {
        Self::trailing(date, 1)
    }

    /// Window covering the `days` calendar days ending on `date` inclusive.
    /// `days` of 0 is treated as 1.
    #[must_use]
    pub fn trailing(date: NaiveDate, days: u64) -> Self {
        let first = date
            .checked_sub_days(Days::new(days.max(1) - 1))
            .unwrap_or(NaiveDate::MIN);
        Self {
            start: midnight(first),
            end: midnight(date.succ_opt().unwrap_or(NaiveDate::MAX)),
        }
    }
}

/// Midnight UTC at the start of `date`.
#[must_use]
pub fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Raw counts gathered from the three sources for one date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricCounts {
    /// Accounts created on or before the date.
    pub total_users: i64,
    /// Accounts created on the date.
    pub new_registrations: i64,
    /// Distinct users logging in during the 7 days ending on the date.
    pub active_users_7d: i64,
    /// Distinct users logging in during the 30 days ending on the date.
    pub active_users_30d: i64,
    /// Paid accounts still valid on the date.
    pub paid_users: i64,
    /// Player searches on the date.
    pub player_searches: i64,
    /// AI analysis requests on the date.
    pub ai_analyses: i64,
    /// Subscriptions activated on the date.
    pub new_subscriptions: i64,
    /// Subscriptions cancelled on the date.
    pub cancelled_subscriptions: i64,
}

/// One aggregate row per calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DailyMetric {
    /// Calendar date.
    pub date: NaiveDate,
    /// Accounts created on or before the date.
    pub total_users: i64,
    /// Accounts created on the date.
    pub new_registrations: i64,
    /// 7-day distinct login count.
    pub active_users_7d: i64,
    /// 30-day distinct login count.
    pub active_users_30d: i64,
    /// Paid accounts still valid on the date.
    pub paid_users: i64,
    /// Monthly recurring revenue.
    pub mrr: f64,
    /// Player searches on the date.
    pub player_searches: i64,
    /// AI analysis requests on the date.
    pub ai_analyses: i64,
    /// Subscriptions activated on the date.
    pub new_subscriptions: i64,
    /// Subscriptions cancelled on the date.
    pub cancelled_subscriptions: i64,
    /// Player searches per 7-day active user.
    pub avg_searches_per_user: f64,
    /// Paid share of all accounts.
    pub conversion_rate: f64,
}

impl DailyMetric {
    /// Derives the row from raw counts. Ratios with a zero denominator are 0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_counts(date: NaiveDate, counts: MetricCounts, seat_price: f64) -> Self {
        Self {
            date,
            total_users: counts.total_users,
            new_registrations: counts.new_registrations,
            active_users_7d: counts.active_users_7d,
            active_users_30d: counts.active_users_30d,
            paid_users: counts.paid_users,
            mrr: counts.paid_users as f64 * seat_price,
            player_searches: counts.player_searches,
            ai_analyses: counts.ai_analyses,
            new_subscriptions: counts.new_subscriptions,
            cancelled_subscriptions: counts.cancelled_subscriptions,
            avg_searches_per_user: ratio(counts.player_searches, counts.active_users_7d),
            conversion_rate: ratio(counts.paid_users, counts.total_users),
        }
    }

    /// Tracked numeric fields as `(name, value)` pairs, in display order.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn tracked_fields(&self) -> [(&'static str, f64); 12] {
        [
            ("total_users", self.total_users as f64),
            ("new_registrations", self.new_registrations as f64),
            ("active_users_7d", self.active_users_7d as f64),
            ("active_users_30d", self.active_users_30d as f64),
            ("paid_users", self.paid_users as f64),
            ("mrr", self.mrr),
            ("player_searches", self.player_searches as f64),
            ("ai_analyses", self.ai_analyses as f64),
            ("new_subscriptions", self.new_subscriptions as f64),
            ("cancelled_subscriptions", self.cancelled_subscriptions as f64),
            ("avg_searches_per_user", self.avg_searches_per_user),
            ("conversion_rate", self.conversion_rate),
        ]
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: i64, denominator: i64) -> f64 {
    if denominator <= 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64
}
