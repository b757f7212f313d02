//! # pokerlens
//!
//! Poker player statistics service: ingests periodic delimited-text
//! snapshots of per-player statistics, serves cached per-player reports,
//! and computes daily business metrics with period-over-period growth.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── IngestService / PlayerService / MetricsService (service/)
//!     │       │                  │
//!     │       │                  └── PlayerCache (cache/, moka)
//!     │       └── IngestPipeline: parse → map → fingerprint → batch upsert (ingest/)
//!     │
//!     ├── FieldMappingTable, snapshots, DailyMetric, growth (domain/)
//!     │
//!     └── StatsStore / AnalyticsStore (persistence/)
//!             ├── PostgreSQL (sqlx)
//!             └── in-memory
//! ```

pub mod api;
pub mod app_state;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod persistence;
pub mod service;
