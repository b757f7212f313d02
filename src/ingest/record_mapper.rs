//! Header validation and row → [`StatSnapshotRecord`] mapping.

use chrono::{DateTime, Utc};

use super::fingerprint::change_hash;
use crate::domain::field_mapping::{
    FieldMappingTable, FieldSpec, HANDS_COLUMN, PLAYER_COLUMN, REQUIRED_COLUMNS, SITE_COLUMN,
    ValueKind, room_code_for,
};
use crate::domain::{SnapshotScope, StatLine, StatSnapshotRecord, StatValue};
use crate::error::AppError;

/// Minimum hand count for a row to be accepted.
pub const MIN_HANDS: i64 = 1;

/// Reason a single data row was not accepted. Rejections are counted, they
/// never abort an upload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowRejection {
    /// The row's field count differs from the header's.
    #[error("expected {expected} fields, found {found}")]
    FieldCountMismatch {
        /// Header width.
        expected: usize,
        /// Row width.
        found: usize,
    },
    /// Player identity is blank.
    #[error("missing player name")]
    MissingPlayer,
    /// Site label is blank.
    #[error("missing site")]
    MissingSite,
    /// Hand count below [`MIN_HANDS`].
    #[error("hand count {0} below minimum")]
    InsufficientHands(i64),
    /// The reader could not decode the record.
    #[error("unreadable record: {0}")]
    Unreadable(String),
    /// A later row in the same batch carries the same identity.
    #[error("duplicate row for player '{0}' superseded by a later row")]
    Superseded(String),
}

/// Column layout of one upload, resolved once from its header line.
#[derive(Debug, Clone)]
pub struct RecordMapper {
    columns: Vec<Option<&'static FieldSpec>>,
    table: FieldMappingTable,
}

impl RecordMapper {
    /// Resolves `headers` against the mapping table.
    ///
    /// Unmapped headers are ignored. When several headers resolve to the same
    /// internal column, the leftmost wins.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::MissingHeaders`] naming every required column
    /// that no header resolves to.
    pub fn from_headers(headers: &[String]) -> Result<Self, AppError> {
        let table = FieldMappingTable::new();
        let mut columns: Vec<Option<&'static FieldSpec>> = Vec::with_capacity(headers.len());
        for header in headers {
            let spec = table.resolve(header).filter(|spec| {
                !columns
                    .iter()
                    .flatten()
                    .any(|seen| seen.column == spec.column)
            });
            columns.push(spec);
        }

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|required| {
                !columns
                    .iter()
                    .flatten()
                    .any(|spec| spec.column == **required)
            })
            .map(|required| {
                table
                    .canonical(required)
                    .map_or(*required, |spec| spec.header)
                    .to_string()
            })
            .collect();
        if !missing.is_empty() {
            return Err(AppError::MissingHeaders(missing));
        }

        Ok(Self { columns, table })
    }

    /// Number of header columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Maps one tokenized row.
    ///
    /// Every numeric column of the table is present in the result; columns
    /// the file does not carry are 0.
    ///
    /// # Errors
    ///
    /// Returns a [`RowRejection`] on width mismatch, blank identity, or a
    /// hand count below [`MIN_HANDS`].
    pub fn map_row(
        &self,
        values: &[String],
        scope: &SnapshotScope,
        processed_at: DateTime<Utc>,
    ) -> Result<StatSnapshotRecord, RowRejection> {
        if values.len() != self.width() {
            return Err(RowRejection::FieldCountMismatch {
                expected: self.width(),
                found: values.len(),
            });
        }

        let mut stats = StatLine::new();
        for spec in self.table.numeric_columns() {
            let zero = match spec.kind {
                ValueKind::Count => StatValue::Count(0),
                _ => StatValue::Amount(0.0),
            };
            stats.set(spec.column, zero);
        }

        let mut player_name = String::new();
        let mut site = String::new();
        for (spec, raw) in self.columns.iter().zip(values) {
            let Some(spec) = spec else { continue };
            match spec.kind {
                ValueKind::Text => match spec.column {
                    PLAYER_COLUMN => raw.trim().clone_into(&mut player_name),
                    SITE_COLUMN => raw.trim().clone_into(&mut site),
                    _ => {}
                },
                ValueKind::Count => stats.set(spec.column, StatValue::Count(coerce_count(raw))),
                ValueKind::Currency => {
                    stats.set(spec.column, StatValue::Amount(coerce_currency(raw)));
                }
                ValueKind::Decimal => {
                    stats.set(spec.column, StatValue::Amount(coerce_decimal(raw)));
                }
            }
        }

        if player_name.is_empty() {
            return Err(RowRejection::MissingPlayer);
        }
        let room = room_code_for(&site).ok_or(RowRejection::MissingSite)?;
        let hands = stats.count_or_zero(HANDS_COLUMN);
        if hands < MIN_HANDS {
            return Err(RowRejection::InsufficientHands(hands));
        }

        let mut record = StatSnapshotRecord {
            snapshot_date: scope.snapshot_date,
            period_type: scope.period_type,
            room,
            stake_category: scope.stake_category,
            player_name,
            site,
            stake_label: scope.stake_label.clone(),
            stats,
            change_hash: String::new(),
            last_processed_at: processed_at,
        };
        record.change_hash = change_hash(&record);
        Ok(record)
    }
}

/// Parses a money amount such as `$1,234.50` or `-€12`. Returns 0.0 when
/// nothing parseable remains.
#[must_use]
pub fn coerce_currency(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
        .collect();
    finite_or_zero(cleaned.parse().ok())
}

/// Parses an integer count such as `12,500`. Decimal input is rounded.
/// Returns 0 when unparseable.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn coerce_count(raw: &str) -> i64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '_' && !c.is_whitespace())
        .collect();
    cleaned.parse::<i64>().unwrap_or_else(|_| {
        cleaned
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map_or(0, |v| v.round() as i64)
    })
}

/// Parses a rate or ratio, tolerating a trailing `%`. Returns 0.0 when
/// unparseable or non-finite.
#[must_use]
pub fn coerce_decimal(raw: &str) -> f64 {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    finite_or_zero(trimmed.parse().ok())
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::PeriodType;
    use chrono::NaiveDate;

    fn headers(line: &str) -> Vec<String> {
        line.split(',').map(str::to_string).collect()
    }

    fn values(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn scope() -> SnapshotScope {
        let Some(date) = NaiveDate::from_ymd_opt(2024, 4, 1) else {
            panic!("valid date");
        };
        let Ok(scope) = SnapshotScope::new(date, PeriodType::Total, "NL50") else {
            panic!("valid scope");
        };
        scope
    }

    fn mapper(line: &str) -> RecordMapper {
        let Ok(mapper) = RecordMapper::from_headers(&headers(line)) else {
            panic!("headers should validate");
        };
        mapper
    }

    #[test]
    fn missing_required_headers_are_named() {
        let result = RecordMapper::from_headers(&headers("Site,Player,Hands,VPIP"));
        let Err(AppError::MissingHeaders(missing)) = result else {
            panic!("expected missing headers");
        };
        assert_eq!(missing, vec!["BB/100".to_string(), "PFR".to_string()]);
    }

    #[test]
    fn maps_values_independent_of_header_order() {
        let a = mapper("Site,Player,Hands,BB/100,VPIP,PFR");
        let b = mapper("PFR,VPIP,BB/100,Hands,Player,Site");
        let now = Utc::now();
        let Ok(ra) = a.map_row(&values(&["XPK", "hero", "1,500", "3.2", "24.1", "18"]), &scope(), now)
        else {
            panic!("row a accepted");
        };
        let Ok(rb) = b.map_row(&values(&["18", "24.1", "3.2", "1,500", "hero", "XPK"]), &scope(), now)
        else {
            panic!("row b accepted");
        };
        assert_eq!(ra, rb);
        assert_eq!(ra.hands(), 1500);
        assert_eq!(ra.stats.get("vpip"), Some(StatValue::Amount(24.1)));
        assert_eq!(ra.stats.get("rake"), Some(StatValue::Amount(0.0)));
    }

    #[test]
    fn rejects_bad_rows() {
        let m = mapper("Site,Player,Hands,BB/100,VPIP,PFR");
        let now = Utc::now();
        assert_eq!(
            m.map_row(&values(&["XPK", "hero"]), &scope(), now).err(),
            Some(RowRejection::FieldCountMismatch { expected: 6, found: 2 })
        );
        assert_eq!(
            m.map_row(&values(&["XPK", " ", "100", "1", "2", "3"]), &scope(), now).err(),
            Some(RowRejection::MissingPlayer)
        );
        assert_eq!(
            m.map_row(&values(&["XPK", "hero", "0", "1", "2", "3"]), &scope(), now).err(),
            Some(RowRejection::InsufficientHands(0))
        );
        assert_eq!(
            m.map_row(&values(&["", "hero", "10", "1", "2", "3"]), &scope(), now).err(),
            Some(RowRejection::MissingSite)
        );
    }

    #[test]
    fn unmapped_and_duplicate_headers_are_ignored() {
        let m = mapper("Site,Notes,Player,Hands,BB/100,VPIP,PFR,Player Name");
        let row = values(&["GGPoker", "fish", "hero", "10", "1", "2", "3", "other"]);
        let Ok(record) = m.map_row(&row, &scope(), Utc::now()) else {
            panic!("row accepted");
        };
        assert_eq!(record.player_name, "hero");
        assert_eq!(record.room, "GG");
        assert_eq!(record.site, "GGPoker");
    }

    #[test]
    fn coercions_default_to_zero() {
        assert_eq!(coerce_currency("$1,234.50"), 1234.5);
        assert_eq!(coerce_currency("-€12"), -12.0);
        assert_eq!(coerce_currency("n/a"), 0.0);
        assert_eq!(coerce_count("12,500"), 12_500);
        assert_eq!(coerce_count("7.6"), 8);
        assert_eq!(coerce_count("lots"), 0);
        assert_eq!(coerce_decimal(" 24.1% "), 24.1);
        assert_eq!(coerce_decimal("NaN"), 0.0);
        assert_eq!(coerce_decimal("-"), 0.0);
    }
}
