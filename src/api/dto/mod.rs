//! Data Transfer Objects for REST request/response serialization.
//!
//! Query parameters are accepted as strings and parsed in the handlers so
//! that malformed values produce the structured error body.

pub mod common_dto;
pub mod metrics_dto;
pub mod stats_dto;

pub use common_dto::*;
pub use metrics_dto::*;
pub use stats_dto::*;
