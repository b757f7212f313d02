//! pokerlens server entry point.
//!
//! Loads configuration, opens the stores, starts the background tasks, and
//! serves the REST API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use chrono::Utc;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use pokerlens::api;
use pokerlens::app_state::AppState;
use pokerlens::config::AppConfig;
use pokerlens::persistence::{AnalyticsStore, MemoryPersistence, PostgresPersistence, StatsStore};
use pokerlens::service::spawn_metrics_scheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    tracing::info!(addr = %config.listen_addr, "starting pokerlens");

    // Build persistence layer
    let (stats, analytics): (Arc<dyn StatsStore>, Arc<dyn AnalyticsStore>) =
        if config.persistence_enabled {
            let db = PostgresPersistence::connect(&config)
                .await
                .context("connecting to PostgreSQL")?;
            db.migrate().await.context("running migrations")?;
            tracing::info!("PostgreSQL persistence ready");
            let db = Arc::new(db);
            (Arc::clone(&db) as Arc<dyn StatsStore>, db as Arc<dyn AnalyticsStore>)
        } else {
            tracing::warn!("persistence disabled, using in-memory stores");
            let memory = Arc::new(MemoryPersistence::new());
            (Arc::clone(&memory) as Arc<dyn StatsStore>, memory as Arc<dyn AnalyticsStore>)
        };

    // Build application state
    let app_state = AppState::new(&config, stats, analytics);

    // Background tasks
    let _maintenance = app_state
        .player_cache
        .spawn_maintenance(Duration::from_secs(config.cache_sweep_interval_secs));

    if config.metrics_backfill_on_start_days > 0 {
        let today = Utc::now().date_naive();
        if let Err(err) = app_state
            .metrics_service
            .backfill(config.metrics_backfill_on_start_days, today)
            .await
        {
            tracing::error!(error = %err, "startup metrics backfill failed");
        }
    }

    let (scheduler_stop, scheduler_rx) = oneshot::channel();
    let scheduler = config.metrics_scheduler_enabled.then(|| {
        spawn_metrics_scheduler(
            Arc::clone(&app_state.metrics_service),
            Duration::from_secs(config.metrics_interval_secs),
            scheduler_rx,
        )
    });

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    let _ = scheduler_stop.send(());
    if let Some(handle) = scheduler {
        let _ = handle.await;
    }

    Ok(())
}
