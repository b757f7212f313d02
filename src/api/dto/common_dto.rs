//! Shared DTO helpers used across multiple endpoints.

use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::AppError;

/// Optional `date` query parameter (`YYYY-MM-DD`, defaults to today UTC).
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateQuery {
    /// Target date, `YYYY-MM-DD`.
    #[serde(default)]
    pub date: Option<String>,
}

impl DateQuery {
    /// Parsed date, `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] if the value is not a date.
    pub fn parsed(&self) -> Result<Option<NaiveDate>, AppError> {
        parse_date("date", self.date.as_deref())
    }
}

/// Parses an optional `YYYY-MM-DD` query value. Blank counts as absent.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] naming `field` when the value does
/// not parse.
pub fn parse_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                AppError::InvalidRequest(format!("{field} '{value}' is not a YYYY-MM-DD date"))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_dates_are_absent() {
        assert_eq!(parse_date("date", None).ok(), Some(None));
        assert_eq!(parse_date("date", Some("  ")).ok(), Some(None));
        assert_eq!(
            parse_date("date", Some("2024-02-29")).ok(),
            Some(NaiveDate::from_ymd_opt(2024, 2, 29))
        );
        assert!(parse_date("date", Some("2023-02-29")).is_err());
    }
}
