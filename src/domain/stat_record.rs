//! Player statistic snapshots and their identity.
//!
//! A [`StatSnapshotRecord`] is unique per
//! (snapshot date, period type, room, stake category, player name); the
//! ingestion pipeline upserts on that tuple and never rewrites it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::field_mapping::{HANDS_COLUMN, HEADLINE_RATE_COLUMN};
use crate::error::AppError;

/// Aggregation window of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    /// Lifetime totals.
    Total,
    /// One week.
    Week,
    /// One month.
    Month,
}

impl PeriodType {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Total => "total",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "total" => Ok(Self::Total),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(AppError::InvalidRequest(format!(
                "unknown period type '{other}' (expected total, week or month)"
            ))),
        }
    }
}

/// Bucketed betting-limit tier assigned at ingest time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StakeCategory {
    /// Big blind level below 10.
    Micro,
    /// Big blind level 10 to 49.
    Low,
    /// Big blind level 50 to 199.
    Mid,
    /// Big blind level 200 and above.
    High,
}

impl StakeCategory {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Micro => "micro",
            Self::Low => "low",
            Self::Mid => "mid",
            Self::High => "high",
        }
    }

    /// Buckets a stake label such as `NL50`, `nl 200` or `100` by its first
    /// numeric run.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] if the label carries no number.
    pub fn from_label(label: &str) -> Result<Self, AppError> {
        let digits: String = label
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(char::is_ascii_digit)
            .collect();
        let level: u64 = digits.parse().map_err(|_| {
            AppError::InvalidRequest(format!("stake label '{label}' has no numeric level"))
        })?;
        Ok(match level {
            0..=9 => Self::Micro,
            10..=49 => Self::Low,
            50..=199 => Self::Mid,
            _ => Self::High,
        })
    }
}

impl fmt::Display for StakeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StakeCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "micro" => Ok(Self::Micro),
            "low" => Ok(Self::Low),
            "mid" => Ok(Self::Mid),
            "high" => Ok(Self::High),
            other => Err(AppError::PersistenceError(format!(
                "unknown stored stake category '{other}'"
            ))),
        }
    }
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct DateRange {
    /// First day, inclusive.
    pub from: NaiveDate,
    /// Last day, inclusive.
    pub to: NaiveDate,
}

impl DateRange {
    /// Builds a range, rejecting `from > to`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for an inverted range.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, AppError> {
        if from > to {
            return Err(AppError::InvalidRequest(format!(
                "date range start {from} is after end {to}"
            )));
        }
        Ok(Self { from, to })
    }

    /// Whether `date` falls inside the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// A coerced numeric statistic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    /// Integer count.
    Count(i64),
    /// Floating point amount or rate.
    Amount(f64),
}

impl StatValue {
    /// Value widened to `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Count(v) => v as f64,
            Self::Amount(v) => v,
        }
    }
}

/// Numeric statistics of one snapshot keyed by internal column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatLine {
    values: BTreeMap<String, StatValue>,
}

impl StatLine {
    /// Creates an empty line.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column value, replacing any previous one.
    pub fn set(&mut self, column: &str, value: StatValue) {
        self.values.insert(column.to_string(), value);
    }

    /// Returns a column value if present.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<StatValue> {
        self.values.get(column).copied()
    }

    /// Column value as `f64`, 0.0 when absent.
    #[must_use]
    pub fn f64_or_zero(&self, column: &str) -> f64 {
        self.get(column).map_or(0.0, StatValue::as_f64)
    }

    /// Column value as an integer count, 0 when absent.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn count_or_zero(&self, column: &str) -> i64 {
        match self.get(column) {
            Some(StatValue::Count(v)) => v,
            Some(StatValue::Amount(v)) => v as i64,
            None => 0,
        }
    }

    /// Iterates columns in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, StatValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Parameters shared by every row of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotScope {
    /// Snapshot date.
    pub snapshot_date: NaiveDate,
    /// Aggregation window.
    pub period_type: PeriodType,
    /// Raw stake label as supplied by the uploader.
    pub stake_label: String,
    /// Bucket derived from the stake label.
    pub stake_category: StakeCategory,
}

impl SnapshotScope {
    /// Builds a scope, deriving the stake category from its label.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] if the stake label is blank or
    /// carries no numeric level.
    pub fn new(
        snapshot_date: NaiveDate,
        period_type: PeriodType,
        stake_label: &str,
    ) -> Result<Self, AppError> {
        let stake_label = stake_label.trim();
        if stake_label.is_empty() {
            return Err(AppError::InvalidRequest("stake label is empty".to_string()));
        }
        Ok(Self {
            snapshot_date,
            period_type,
            stake_label: stake_label.to_string(),
            stake_category: StakeCategory::from_label(stake_label)?,
        })
    }
}

/// Natural key of a snapshot row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotKey {
    /// Snapshot date.
    pub snapshot_date: NaiveDate,
    /// Aggregation window.
    pub period_type: PeriodType,
    /// Canonical room code.
    pub room: String,
    /// Stake bucket.
    pub stake_category: StakeCategory,
    /// Player identity.
    pub player_name: String,
}

/// One persisted row of player statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatSnapshotRecord {
    /// Snapshot date.
    pub snapshot_date: NaiveDate,
    /// Aggregation window.
    pub period_type: PeriodType,
    /// Canonical room code.
    pub room: String,
    /// Stake bucket.
    pub stake_category: StakeCategory,
    /// Player identity.
    pub player_name: String,
    /// Site label exactly as it appeared in the file (trimmed).
    pub site: String,
    /// Stake label supplied with the upload.
    pub stake_label: String,
    /// Numeric statistics.
    pub stats: StatLine,
    /// Change fingerprint of identity and volatile fields.
    pub change_hash: String,
    /// Last time this row was written by an ingest.
    pub last_processed_at: DateTime<Utc>,
}

impl StatSnapshotRecord {
    /// Returns the natural key.
    #[must_use]
    pub fn key(&self) -> SnapshotKey {
        SnapshotKey {
            snapshot_date: self.snapshot_date,
            period_type: self.period_type,
            room: self.room.clone(),
            stake_category: self.stake_category,
            player_name: self.player_name.clone(),
        }
    }

    /// Hand count.
    #[must_use]
    pub fn hands(&self) -> i64 {
        self.stats.count_or_zero(HANDS_COLUMN)
    }

    /// Headline win rate in big blinds per 100 hands.
    #[must_use]
    pub fn headline_rate(&self) -> f64 {
        self.stats.f64_or_zero(HEADLINE_RATE_COLUMN)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn stake_buckets() {
        let cases = [
            ("NL2", StakeCategory::Micro),
            ("nl 10", StakeCategory::Low),
            ("NL50", StakeCategory::Mid),
            ("PLO200", StakeCategory::High),
            ("1000", StakeCategory::High),
        ];
        for (label, expected) in cases {
            let Ok(category) = StakeCategory::from_label(label) else {
                panic!("label {label} should bucket");
            };
            assert_eq!(category, expected, "{label}");
        }
        assert!(StakeCategory::from_label("high stakes").is_err());
    }

    #[test]
    fn period_type_parses_case_insensitively() {
        assert_eq!("Week".parse::<PeriodType>().ok(), Some(PeriodType::Week));
        assert!("daily".parse::<PeriodType>().is_err());
    }

    #[test]
    fn date_range_rejects_inverted() {
        let Some(a) = NaiveDate::from_ymd_opt(2024, 3, 1) else {
            panic!("valid date");
        };
        let Some(b) = NaiveDate::from_ymd_opt(2024, 3, 31) else {
            panic!("valid date");
        };
        assert!(DateRange::new(b, a).is_err());
        let Ok(range) = DateRange::new(a, b) else {
            panic!("valid range");
        };
        assert!(range.contains(a) && range.contains(b));
    }

    #[test]
    fn stat_line_defaults_to_zero() {
        let mut line = StatLine::new();
        line.set("hands", StatValue::Count(1500));
        assert_eq!(line.count_or_zero("hands"), 1500);
        assert!((line.f64_or_zero("vpip") - 0.0).abs() < f64::EPSILON);
    }
}
