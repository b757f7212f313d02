//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Resource endpoints are mounted under `/api/v1`; health and configuration
//! endpoints at the root. With the `swagger-ui` feature the OpenAPI document
//! is served at `/api-docs/openapi.json` and browsable at `/swagger-ui`.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document of every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "pokerlens", description = "Player statistics ingestion, cached player reports, and daily business metrics"),
    paths(
        handlers::system::health_handler,
        handlers::system::stat_fields_handler,
        handlers::stats::upload_stats,
        handlers::players::get_player,
        handlers::players::clear_cache,
        handlers::metrics::calculate,
        handlers::metrics::backfill,
        handlers::metrics::growth,
        handlers::metrics::recent,
        handlers::metrics::record_event,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        crate::ingest::IngestSummary,
        crate::domain::DailyMetric,
        crate::domain::GrowthComparison,
        crate::domain::growth::FieldGrowth,
        crate::domain::EventKind,
        crate::domain::StatGroup,
        crate::domain::ValueKind,
        dto::StatFieldDto,
        dto::StatFieldCatalog,
        dto::BackfillResponse,
        dto::RecordEventRequest,
        dto::RecordEventResponse,
        handlers::system::HealthResponse,
    )),
    tags(
        (name = "System", description = "Health and configuration"),
        (name = "Stats", description = "Statistics uploads"),
        (name = "Players", description = "Player reports and cache"),
        (name = "Metrics", description = "Daily business metrics"),
        (name = "Events", description = "Event log"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::config::AppConfig;
    use crate::persistence::{AnalyticsStore, MemoryPersistence, StatsStore};

    fn app() -> Router {
        let memory = Arc::new(MemoryPersistence::new());
        let state = AppState::new(
            &AppConfig::default(),
            Arc::clone(&memory) as Arc<dyn StatsStore>,
            memory as Arc<dyn AnalyticsStore>,
        );
        build_router().with_state(state)
    }

    #[tokio::test]
    async fn inverted_player_range_is_rejected() {
        let Ok(request) = Request::get("/api/v1/players/XPK/hero?from=2024-02-01&to=2024-01-01")
            .body(Body::empty())
        else {
            panic!("valid request");
        };
        let Ok(response) = app().oneshot(request).await else {
            panic!("router failed");
        };
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), 64 * 1024).await else {
            panic!("body unreadable");
        };
        let Ok(body) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
            panic!("body is not JSON");
        };
        assert_eq!(body["error"]["code"], 1001);
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let Ok(request) = Request::post(
            "/api/v1/stats/upload?period_type=total&snapshot_date=2024-01-01&stake=NL10",
        )
        .body(Body::from("\n\n"))
        else {
            panic!("valid request");
        };
        let Ok(response) = app().oneshot(request).await else {
            panic!("router failed");
        };
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/config/stat-fields",
            "/api/v1/stats/upload",
            "/api/v1/players/{room}/{player}",
            "/api/v1/cache",
            "/api/v1/events",
            "/api/v1/metrics/calculate",
            "/api/v1/metrics/backfill",
            "/api/v1/metrics/growth",
            "/api/v1/metrics/daily",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
    }
}
