//! End-to-end tests of the REST API over in-memory stores.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use serde_json::Value;
use tokio_test::assert_ok;

use pokerlens::api;
use pokerlens::app_state::AppState;
use pokerlens::config::AppConfig;
use pokerlens::persistence::{AnalyticsStore, MemoryPersistence, StatsStore};

const UPLOAD: &str = "Site,Player,Hands,BB/100,VPIP,PFR,Total Won\n\
XPK,\"Villain, Jr\",1500,3.2,24.1,18.0,\"$1,250.00\"\n\
XPK,hero,0,1,2,3,0\n\
GGPoker,reg,900,-1.5,21%,17%,-40\n";

async fn spawn_app() -> SocketAddr {
    let memory = Arc::new(MemoryPersistence::new());
    let state = AppState::new(
        &AppConfig::default(),
        Arc::clone(&memory) as Arc<dyn StatsStore>,
        memory as Arc<dyn AnalyticsStore>,
    );
    let app = Router::new().merge(api::build_router()).with_state(state);

    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn json(response: reqwest::Response) -> Value {
    let Ok(body) = response.json::<Value>().await else {
        panic!("response is not JSON");
    };
    body
}

#[tokio::test]
async fn health_and_catalogue() {
    let addr = spawn_app().await;
    let client = reqwest::Client::new();

    let health = assert_ok!(client.get(format!("http://{addr}/health")).send().await);
    assert_eq!(health.status(), 200);
    assert_eq!(json(health).await["status"], "healthy");

    let fields = assert_ok!(client.get(format!("http://{addr}/config/stat-fields")).send().await);
    let body = json(fields).await;
    let Some(required) = body["required_headers"].as_array() else {
        panic!("required_headers missing");
    };
    assert_eq!(required.len(), 6);
}

#[tokio::test]
async fn upload_then_read_player_report() {
    let addr = spawn_app().await;
    let client = reqwest::Client::new();
    let upload_url = format!(
        "http://{addr}/api/v1/stats/upload?period_type=total&snapshot_date=2024-05-01&stake=NL50"
    );

    let response = assert_ok!(client.post(&upload_url).body(UPLOAD).send().await);
    assert_eq!(response.status(), 200);
    let summary = json(response).await;
    assert_eq!(summary["total_rows"], 3);
    assert_eq!(summary["processed"], 2);
    assert_eq!(summary["rejected"], 1);
    assert_eq!(summary["inserted"], 2);

    let again = assert_ok!(client.post(&upload_url).body(UPLOAD).send().await);
    let summary = json(again).await;
    assert_eq!(summary["inserted"], 0);
    assert_eq!(summary["updated"], 2);

    let report = assert_ok!(
        client
            .get(format!("http://{addr}/api/v1/players/XPK/Villain,%20Jr"))
            .send()
            .await
    );
    assert_eq!(report.status(), 200);
    let report = json(report).await;
    assert_eq!(report["total_hands"], 1500);
    assert_eq!(report["headline"]["total_won"], 1250.0);
    assert_eq!(report["stakes"][0], "mid");

    let missing = assert_ok!(
        client
            .get(format!("http://{addr}/api/v1/players/GG/nobody"))
            .send()
            .await
    );
    assert_eq!(missing.status(), 404);
    assert_eq!(json(missing).await["error"]["code"], 2001);

    let cleared = assert_ok!(client.delete(format!("http://{addr}/api/v1/cache")).send().await);
    assert_eq!(cleared.status(), 204);
}

#[tokio::test]
async fn upload_validation_errors() {
    let addr = spawn_app().await;
    let client = reqwest::Client::new();

    let no_params = assert_ok!(
        client
            .post(format!("http://{addr}/api/v1/stats/upload"))
            .body(UPLOAD)
            .send()
            .await
    );
    assert_eq!(no_params.status(), 400);
    assert_eq!(json(no_params).await["error"]["code"], 1001);

    let bad_header = assert_ok!(
        client
            .post(format!(
                "http://{addr}/api/v1/stats/upload?period_type=week&snapshot_date=2024-05-01&stake=NL2"
            ))
            .body("Site,Player,Hands\nXPK,hero,10\n")
            .send()
            .await
    );
    assert_eq!(bad_header.status(), 400);
    let body = json(bad_header).await;
    assert_eq!(body["error"]["code"], 1002);
    assert_eq!(body["error"]["details"], "BB/100,VPIP,PFR");
}

#[tokio::test]
async fn events_metrics_and_growth() {
    let addr = spawn_app().await;
    let client = reqwest::Client::new();

    let recorded = assert_ok!(
        client
            .post(format!("http://{addr}/api/v1/events"))
            .json(&serde_json::json!({ "event_type": "player_search", "payload": { "q": "hero" } }))
            .send()
            .await
    );
    assert_eq!(recorded.status(), 201);

    let unknown = assert_ok!(
        client
            .post(format!("http://{addr}/api/v1/events"))
            .json(&serde_json::json!({ "event_type": "teleport" }))
            .send()
            .await
    );
    assert!(unknown.status().is_client_error());

    let growth = assert_ok!(
        client
            .get(format!("http://{addr}/api/v1/metrics/growth?date=2024-06-10"))
            .send()
            .await
    );
    let body = json(growth).await;
    assert_eq!(body["status"], "insufficient_data");
    assert_eq!(body["missing"].as_array().map(Vec::len), Some(2));

    let backfill = assert_ok!(
        client
            .post(format!("http://{addr}/api/v1/metrics/backfill?days=8&end=2024-06-10"))
            .send()
            .await
    );
    assert_eq!(backfill.status(), 200);
    assert_eq!(json(backfill).await["days"], 8);

    let growth = assert_ok!(
        client
            .get(format!("http://{addr}/api/v1/metrics/growth?date=2024-06-10"))
            .send()
            .await
    );
    let body = json(growth).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["previous_date"], "2024-06-03");

    let recent = assert_ok!(
        client
            .get(format!("http://{addr}/api/v1/metrics/daily?limit=3"))
            .send()
            .await
    );
    let body = json(recent).await;
    assert_eq!(body.as_array().map(Vec::len), Some(3));
    assert_eq!(body[0]["date"], "2024-06-10");

    let bad_date = assert_ok!(
        client
            .post(format!("http://{addr}/api/v1/metrics/calculate?date=June"))
            .send()
            .await
    );
    assert_eq!(bad_date.status(), 400);
}
