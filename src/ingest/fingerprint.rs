//! Cheap change fingerprint over a record's identity and volatile fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::StatSnapshotRecord;
use crate::error::AppError;

/// What to do with a row whose fingerprint matches the stored one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintPolicy {
    /// Upsert every row, refreshing `last_processed_at` even when unchanged.
    #[default]
    Always,
    /// Skip rows whose fingerprint equals the stored row's.
    SkipUnchanged,
}

impl fmt::Display for FingerprintPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Always => "always",
            Self::SkipUnchanged => "skip_unchanged",
        })
    }
}

impl FromStr for FingerprintPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "skip_unchanged" | "skip-unchanged" => Ok(Self::SkipUnchanged),
            other => Err(AppError::InvalidRequest(format!(
                "unknown fingerprint policy '{other}'"
            ))),
        }
    }
}

/// Fingerprint of identity, hand count, headline rate and stake label, as
/// eight lowercase hex digits.
#[must_use]
pub fn change_hash(record: &StatSnapshotRecord) -> String {
    let input = format!(
        "{}|{}|{}|{}|{}|{}|{:.2}|{}",
        record.snapshot_date,
        record.period_type,
        record.room,
        record.stake_category,
        record.player_name,
        record.hands(),
        record.headline_rate(),
        record.stake_label,
    );
    format!("{:08x}", rolling_hash(&input))
}

/// Polynomial rolling hash, base 31, wrapping at 32 bits.
fn rolling_hash(input: &str) -> u32 {
    input
        .bytes()
        .fold(0_u32, |hash, byte| hash.wrapping_mul(31).wrapping_add(u32::from(byte)))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{PeriodType, StakeCategory, StatLine, StatValue};
    use chrono::{NaiveDate, Utc};

    fn record(hands: i64, vpip: f64) -> StatSnapshotRecord {
        let Some(date) = NaiveDate::from_ymd_opt(2024, 1, 7) else {
            panic!("valid date");
        };
        let mut stats = StatLine::new();
        stats.set("hands", StatValue::Count(hands));
        stats.set("bb_per_100", StatValue::Amount(3.2));
        stats.set("vpip", StatValue::Amount(vpip));
        StatSnapshotRecord {
            snapshot_date: date,
            period_type: PeriodType::Week,
            room: "XPK".to_string(),
            stake_category: StakeCategory::Mid,
            player_name: "hero".to_string(),
            site: "XPK".to_string(),
            stake_label: "NL100".to_string(),
            stats,
            change_hash: String::new(),
            last_processed_at: Utc::now(),
        }
    }

    #[test]
    fn known_value() {
        assert_eq!(rolling_hash(""), 0);
        assert_eq!(rolling_hash("a"), 97);
        assert_eq!(rolling_hash("ab"), 97 * 31 + 98);
    }

    #[test]
    fn tracks_volatile_fields_only() {
        let base = change_hash(&record(1500, 24.0));
        assert_eq!(base.len(), 8);
        assert_eq!(base, change_hash(&record(1500, 30.0)));
        assert_ne!(base, change_hash(&record(1501, 24.0)));
    }

    #[test]
    fn policy_parses() {
        assert_eq!("skip_unchanged".parse::<FingerprintPolicy>().ok(), Some(FingerprintPolicy::SkipUnchanged));
        assert_eq!(FingerprintPolicy::default(), FingerprintPolicy::Always);
        assert!("sometimes".parse::<FingerprintPolicy>().is_err());
    }
}
