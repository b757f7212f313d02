//! Period-over-period comparison of two [`DailyMetric`] rows.

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use super::metrics::DailyMetric;

/// Percentage change of one tracked field.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FieldGrowth {
    /// Field name.
    pub field: &'static str,
    /// Value on the current date.
    pub current: f64,
    /// Value on the comparison date.
    pub previous: f64,
    /// `(current - previous) / previous * 100`, see [`growth_pct`].
    pub growth_pct: f64,
}

/// Outcome of comparing two dates.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GrowthComparison {
    /// Both rows existed.
    Ok {
        /// Date being reported.
        current_date: NaiveDate,
        /// Date compared against.
        previous_date: NaiveDate,
        /// One entry per tracked field.
        fields: Vec<FieldGrowth>,
    },
    /// At least one row was absent; no numbers are reported.
    InsufficientData {
        /// Date being reported.
        current_date: NaiveDate,
        /// Date compared against.
        previous_date: NaiveDate,
        /// Dates without a stored row.
        missing: Vec<NaiveDate>,
    },
}

/// Growth in percent. A zero `previous` yields 100 when `current` is
/// positive and 0 otherwise.
#[must_use]
pub fn growth_pct(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }
    (current - previous) / previous * 100.0
}

/// Compares `current` against `previous`.
#[must_use]
pub fn compare(
    current_date: NaiveDate,
    previous_date: NaiveDate,
    current: Option<&DailyMetric>,
    previous: Option<&DailyMetric>,
) -> GrowthComparison {
    let (Some(current), Some(previous)) = (current, previous) else {
        let missing = [(current_date, current.is_none()), (previous_date, previous.is_none())]
            .into_iter()
            .filter_map(|(date, absent)| absent.then_some(date))
            .collect();
        return GrowthComparison::InsufficientData {
            current_date,
            previous_date,
            missing,
        };
    };

    let fields = current
        .tracked_fields()
        .into_iter()
        .zip(previous.tracked_fields())
        .map(|((field, now), (_, before))| FieldGrowth {
            field,
            current: now,
            previous: before,
            growth_pct: growth_pct(now, before),
        })
        .collect();

    GrowthComparison::Ok {
        current_date,
        previous_date,
        fields,
    }
}
