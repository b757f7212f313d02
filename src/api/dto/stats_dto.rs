//! Upload and player report DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::parse_date;
use crate::domain::{DateRange, StatGroup, ValueKind};
use crate::error::AppError;

/// Query parameters of `POST /stats/upload`.
///
/// All three are required; they are optional here so that absence is
/// reported as a structured [`AppError`] rather than an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadQuery {
    /// `total`, `week` or `month`.
    #[serde(default)]
    pub period_type: Option<String>,
    /// Snapshot date, `YYYY-MM-DD`.
    #[serde(default)]
    pub snapshot_date: Option<String>,
    /// Stake label such as `NL50`.
    #[serde(default)]
    pub stake: Option<String>,
}

/// Optional date filter of `GET /players/{room}/{player}`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PlayerRangeQuery {
    /// First snapshot date, inclusive.
    #[serde(default)]
    pub from: Option<String>,
    /// Last snapshot date, inclusive.
    #[serde(default)]
    pub to: Option<String>,
}

impl PlayerRangeQuery {
    /// The requested range, `None` when neither bound is given.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] if only one bound is given, a
    /// bound does not parse, or `from` is after `to`.
    pub fn range(&self) -> Result<Option<DateRange>, AppError> {
        let from = parse_date("from", self.from.as_deref())?;
        let to = parse_date("to", self.to.as_deref())?;
        match (from, to) {
            (None, None) => Ok(None),
            (Some(from), Some(to)) => DateRange::new(from, to).map(Some),
            _ => Err(AppError::InvalidRequest(
                "from and to must be given together".to_string(),
            )),
        }
    }
}

/// One row of the stat field catalogue.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatFieldDto {
    /// Header accepted in uploads.
    pub header: &'static str,
    /// Internal column the header maps to.
    pub column: &'static str,
    /// Display label.
    pub label: &'static str,
    /// Semantic group.
    pub group: StatGroup,
    /// Coercion rule.
    pub kind: ValueKind,
    /// Whether the column must be present in every upload.
    pub required: bool,
    /// Whether this header is an alias of an earlier one.
    pub alias: bool,
}

/// Response of `GET /config/stat-fields`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatFieldCatalog {
    /// Canonical names of the required headers.
    pub required_headers: Vec<&'static str>,
    /// Every accepted header.
    pub fields: Vec<StatFieldDto>,
}
