//! REST endpoint handlers organized by resource.

pub mod metrics;
pub mod players;
pub mod stats;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(stats::routes())
        .merge(players::routes())
        .merge(metrics::routes())
}
