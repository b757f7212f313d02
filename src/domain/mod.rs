//! Domain layer: statistics schema, snapshot records, and business metrics.
//!
//! This module holds the declarative field-mapping table that defines the
//! contract between uploaded files and storage, the snapshot record and its
//! natural key, the daily metric row with its derivation rules, and the
//! growth comparison between two metric rows.

pub mod field_mapping;
pub mod growth;
pub mod metrics;
pub mod player_report;
pub mod stat_record;

pub use field_mapping::{FieldMappingTable, FieldSpec, StatGroup, ValueKind};
pub use growth::GrowthComparison;
pub use metrics::{Account, DailyMetric, EventKind, MetricCounts, NewEvent, SubscriptionTier};
pub use player_report::PlayerReport;
pub use stat_record::{
    DateRange, PeriodType, SnapshotKey, SnapshotScope, StakeCategory, StatLine,
    StatSnapshotRecord, StatValue,
};
