//! Service layer: business logic orchestration.
//!
//! - [`IngestService`] validates upload parameters, runs the ingest
//!   pipeline, and invalidates cached reads.
//! - [`PlayerService`] serves player reports through the TTL cache.
//! - [`MetricsService`] computes, backfills, and compares daily metrics and
//!   records events; [`scheduler`] runs it on a timer.

pub mod ingest_service;
pub mod metrics_service;
pub mod player_service;
pub mod scheduler;

pub use ingest_service::IngestService;
pub use metrics_service::MetricsService;
pub use player_service::PlayerService;
pub use scheduler::spawn_metrics_scheduler;
