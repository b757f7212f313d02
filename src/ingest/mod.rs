//! Statistics upload ingestion.
//!
//! - [`delimited`]: `csv` record reading and delimiter detection.
//! - [`record_mapper`]: header validation and row mapping with type coercion.
//! - [`fingerprint`]: change fingerprints and the skip policy.
//! - [`pipeline`]: batched, failure-isolated upserts with a run summary.

pub mod delimited;
pub mod fingerprint;
pub mod pipeline;
pub mod record_mapper;

pub use fingerprint::{FingerprintPolicy, change_hash};
pub use delimited::{detect_delimiter, read_rows};
pub use pipeline::{DEFAULT_BATCH_SIZE, IngestPipeline, IngestSummary, MAX_ERROR_SAMPLES};
pub use record_mapper::{MIN_HANDS, RecordMapper, RowRejection};
