//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::cache::{CachePolicy, PlayerCache};
use crate::config::AppConfig;
use crate::ingest::IngestPipeline;
use crate::persistence::{AnalyticsStore, StatsStore};
use crate::service::{IngestService, MetricsService, PlayerService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Upload ingestion.
    pub ingest_service: Arc<IngestService>,
    /// Cached player reads.
    pub player_service: Arc<PlayerService>,
    /// Daily metrics and the event log.
    pub metrics_service: Arc<MetricsService>,
    /// Player report cache, owned here so the startup sequence can start
    /// its maintenance task once.
    pub player_cache: Arc<PlayerCache>,
}

impl AppState {
    /// Wires services over the given stores.
    #[must_use]
    pub fn new(
        config: &AppConfig,
        stats: Arc<dyn StatsStore>,
        analytics: Arc<dyn AnalyticsStore>,
    ) -> Self {
        let player_cache = Arc::new(PlayerCache::new(CachePolicy {
            ranged_ttl: config.cache_ranged_ttl(),
            unranged_ttl: config.cache_unranged_ttl(),
        }));
        let pipeline = IngestPipeline::new(
            Arc::clone(&stats),
            config.ingest_batch_size,
            config.fingerprint_policy,
        );

        Self {
            ingest_service: Arc::new(IngestService::new(pipeline, Arc::clone(&player_cache))),
            player_service: Arc::new(PlayerService::new(stats, Arc::clone(&player_cache))),
            metrics_service: Arc::new(MetricsService::new(
                analytics,
                config.mrr_seat_price,
                config.growth_lookback_days,
            )),
            player_cache,
        }
    }
}
