//! Per-player read aggregation over stored snapshots.

use std::collections::BTreeMap;

use serde::Serialize;

use super::field_mapping::{FieldMappingTable, ValueKind};
use super::stat_record::{DateRange, PeriodType, StakeCategory, StatSnapshotRecord};

/// Aggregated view of one player in one room.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerReport {
    /// Canonical room code.
    pub room: String,
    /// Player identity.
    pub player_name: String,
    /// Date filter the report was built with, if any.
    pub range: Option<DateRange>,
    /// Number of stored snapshots considered.
    pub snapshot_count: usize,
    /// Hands across the headline snapshots.
    pub total_hands: i64,
    /// Stake buckets the player appears in.
    pub stakes: Vec<StakeCategory>,
    /// Hand-weighted rates and summed counts/amounts over the headline
    /// snapshots, keyed by internal column.
    pub headline: BTreeMap<&'static str, f64>,
    /// Latest snapshot per (period type, stake category).
    pub latest: Vec<StatSnapshotRecord>,
}

impl PlayerReport {
    /// Builds the report from every stored snapshot matching the query.
    ///
    /// Headline figures use the latest `total` snapshot of each stake; when
    /// the player has no `total` snapshot, the latest snapshot of every
    /// (period, stake) pair is used instead.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn build(
        room: &str,
        player_name: &str,
        range: Option<DateRange>,
        snapshots: Vec<StatSnapshotRecord>,
    ) -> Self {
        let snapshot_count = snapshots.len();

        let mut latest: BTreeMap<(PeriodType, StakeCategory), StatSnapshotRecord> = BTreeMap::new();
        for snapshot in snapshots {
            let slot = (snapshot.period_type, snapshot.stake_category);
            match latest.get(&slot) {
                Some(existing) if existing.snapshot_date >= snapshot.snapshot_date => {}
                _ => {
                    latest.insert(slot, snapshot);
                }
            }
        }
        let latest: Vec<StatSnapshotRecord> = latest.into_values().collect();

        let totals: Vec<&StatSnapshotRecord> = latest
            .iter()
            .filter(|s| s.period_type == PeriodType::Total)
            .collect();
        let basis: Vec<&StatSnapshotRecord> = if totals.is_empty() {
            latest.iter().collect()
        } else {
            totals
        };

        let total_hands: i64 = basis.iter().map(|s| s.hands()).sum();
        let mut headline = BTreeMap::new();
        for spec in FieldMappingTable::new().numeric_columns() {
            let value = match spec.kind {
                ValueKind::Decimal => {
                    if total_hands > 0 {
                        basis
                            .iter()
                            .map(|s| s.stats.f64_or_zero(spec.column) * s.hands() as f64)
                            .sum::<f64>()
                            / total_hands as f64
                    } else {
                        0.0
                    }
                }
                ValueKind::Count | ValueKind::Currency => basis
                    .iter()
                    .map(|s| s.stats.f64_or_zero(spec.column))
                    .sum(),
                ValueKind::Text => continue,
            };
            headline.insert(spec.column, value);
        }

        let mut stakes: Vec<StakeCategory> = latest.iter().map(|s| s.stake_category).collect();
        stakes.sort();
        stakes.dedup();

        Self {
            room: room.to_string(),
            player_name: player_name.to_string(),
            range,
            snapshot_count,
            total_hands,
            stakes,
            headline,
            latest,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::stat_record::{StatLine, StatValue};
    use chrono::{NaiveDate, Utc};

    fn snapshot(
        day: u32,
        period: PeriodType,
        stake: StakeCategory,
        hands: i64,
        vpip: f64,
    ) -> StatSnapshotRecord {
        let Some(date) = NaiveDate::from_ymd_opt(2024, 2, day) else {
            panic!("valid date");
        };
        let mut stats = StatLine::new();
        stats.set("hands", StatValue::Count(hands));
        stats.set("vpip", StatValue::Amount(vpip));
        stats.set("total_won", StatValue::Amount(100.0));
        StatSnapshotRecord {
            snapshot_date: date,
            period_type: period,
            room: "XPK".to_string(),
            stake_category: stake,
            player_name: "hero".to_string(),
            site: "XPK".to_string(),
            stake_label: "NL50".to_string(),
            stats,
            change_hash: String::new(),
            last_processed_at: Utc::now(),
        }
    }

    #[test]
    fn weights_rates_by_hands_over_latest_totals() {
        let report = PlayerReport::build(
            "XPK",
            "hero",
            None,
            vec![
                snapshot(1, PeriodType::Total, StakeCategory::Mid, 500, 40.0),
                snapshot(8, PeriodType::Total, StakeCategory::Mid, 1000, 20.0),
                snapshot(8, PeriodType::Total, StakeCategory::Low, 3000, 30.0),
                snapshot(8, PeriodType::Week, StakeCategory::Mid, 200, 90.0),
            ],
        );
        assert_eq!(report.snapshot_count, 4);
        assert_eq!(report.latest.len(), 3);
        assert_eq!(report.total_hands, 4000);
        let vpip = report.headline.get("vpip").copied().unwrap_or_default();
        assert!((vpip - 27.5).abs() < 1e-9);
        assert_eq!(report.headline.get("total_won").copied(), Some(200.0));
        assert_eq!(report.stakes, vec![StakeCategory::Low, StakeCategory::Mid]);
    }

    #[test]
    fn falls_back_to_all_periods_without_totals() {
        let report = PlayerReport::build(
            "XPK",
            "hero",
            None,
            vec![snapshot(8, PeriodType::Week, StakeCategory::Mid, 200, 10.0)],
        );
        assert_eq!(report.total_hands, 200);
    }

    #[test]
    fn empty_input_is_zeroed() {
        let report = PlayerReport::build("XPK", "ghost", None, Vec::new());
        assert_eq!(report.total_hands, 0);
        assert_eq!(report.headline.get("vpip").copied(), Some(0.0));
    }
}
