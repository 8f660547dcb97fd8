//! HTTP-level tests for the scrape API.

use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use scrape_engine::{
    testing::MockExtractor, EngineConfig, ExtractorRegistry, SessionManager, SiteId,
};
use scrape_server::server::{build_app, AppState};

/// Helper to build an app over a demo registry without latency.
fn demo_app() -> (Router, AppState) {
    let manager = SessionManager::new(ExtractorRegistry::demo(Duration::ZERO));
    let state = AppState::new(manager);
    let app = build_app(state.clone(), &["http://localhost:3000".to_string()]);
    (app, state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn start(app: &Router, body: Value) -> Uuid {
    let (status, response) = send_json(app, post_json("/api/scrape/start", body)).await;
    assert_eq!(status, StatusCode::OK, "{}", response);
    assert_eq!(response["status"], "started");
    response["sessionId"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_health_and_sites() {
    let (app, _) = demo_app();

    let (status, health) = send_json(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["enabledSites"], 12);

    let (status, sites) = send_json(&app, get("/api/sites")).await;
    assert_eq!(status, StatusCode::OK);
    let sites = sites.as_array().unwrap();
    assert_eq!(sites.len(), 12);
    assert_eq!(sites[0]["id"], "indeed");
    assert!(sites.iter().all(|s| s["enabled"] == true));
}

#[tokio::test]
async fn test_full_session_over_http() {
    let (app, state) = demo_app();

    let id = start(
        &app,
        json!({
            "configs": [
                { "site": "indeed", "keyword": "エンジニア", "location": "東京", "maxPages": 2 },
                { "site": "townwork", "keyword": "エンジニア", "location": "東京", "maxPages": 1 }
            ]
        }),
    )
    .await;

    tokio::time::timeout(Duration::from_secs(5), state.manager.wait(id))
        .await
        .unwrap()
        .unwrap();

    let (status, results) = send_json(&app, get(&format!("/api/scrape/status/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["site"], "indeed");
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[0]["totalItems"], 10);
    assert_eq!(results[1]["totalItems"], 5);

    let (status, body) = send(&app, get(&format!("/api/export/{}/tabular", id))).await;
    assert_eq!(status, StatusCode::OK);
    let csv = String::from_utf8(body).unwrap();
    assert!(csv.starts_with("site,title,company,location,salary,url,employmentType,description\r\n"));
    assert_eq!(csv.lines().count(), 16);

    let (status, rows) = send_json(&app, get(&format!("/api/export/{}/json", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows.as_array().unwrap().len(), 15);

    let (status, history) = send_json(&app, get("/api/history")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history[0]["sessionId"], id.to_string());
    assert_eq!(history[0]["status"], "completed");

    let response = app
        .clone()
        .oneshot(
            Request::delete(format!("/api/scrape/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, _) = send_json(&app, get(&format!("/api/scrape/status/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_start_requests() {
    let (app, _) = demo_app();

    let cases = [
        json!({ "configs": [] }),
        json!({ "configs": [{ "site": "monster", "keyword": "x" }] }),
        json!({ "configs": [{ "site": "indeed", "keyword": "  " }] }),
        json!({ "configs": [{ "site": "indeed", "keyword": "x", "maxPages": 0 }] }),
        json!({ "configs": [{ "site": "indeed", "keyword": "x", "maxPages": 51 }] }),
    ];

    for body in cases {
        let (status, response) = send_json(&app, post_json("/api/scrape/start", body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert!(response["error"].is_string());
    }
}

#[tokio::test]
async fn test_unknown_and_malformed_session_ids() {
    let (app, _) = demo_app();
    let unknown = Uuid::new_v4();

    let (status, _) = send_json(&app, get(&format!("/api/scrape/status/{}", unknown))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(
        &app,
        Request::post(format!("/api/scrape/stop/{}", unknown))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app, get("/api/scrape/status/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stop_and_export_conflict_while_running() {
    let slow = MockExtractor::new()
        .with_pages(&[1, 1, 1])
        .with_delay(Duration::from_secs(30));
    let registry = ExtractorRegistry::new().with_extractor(SiteId::Yahoo, slow);
    let config = EngineConfig::default().with_cancel_grace_period(Duration::from_millis(20));
    let state = AppState::new(SessionManager::with_config(registry, config));
    let app = build_app(state.clone(), &["*".to_string()]);

    let id = start(
        &app,
        json!({ "configs": [{ "site": "yahoo", "keyword": "driver", "maxPages": 3 }] }),
    )
    .await;

    let (status, progress) = send_json(&app, get(&format!("/api/scrape/status/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress[0]["site"], "yahoo");
    assert_eq!(progress[0]["sessionId"], id.to_string());

    let (status, _) = send_json(&app, get(&format!("/api/export/{}/structured", id))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send_json(&app, get(&format!("/api/export/{}/xlsx", id))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send_json(
        &app,
        Request::post(format!("/api/scrape/stop/{}", id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "stopping");

    tokio::time::timeout(Duration::from_secs(5), state.manager.wait(id))
        .await
        .unwrap()
        .unwrap();

    let (_, results) = send_json(&app, get(&format!("/api/scrape/status/{}", id))).await;
    assert_eq!(results[0]["success"], false);
    assert_eq!(results[0]["error"], "cancelled");

    let (_, history) = send_json(&app, get("/api/history")).await;
    assert_eq!(history[0]["status"], "cancelled");
}

#[tokio::test]
async fn test_stream_of_finished_session_is_snapshot_then_complete() {
    let (app, state) = demo_app();
    let id = start(
        &app,
        json!({ "configs": [{ "site": "baitoru", "keyword": "cafe", "maxPages": 1 }] }),
    )
    .await;
    tokio::time::timeout(Duration::from_secs(5), state.manager.wait(id))
        .await
        .unwrap()
        .unwrap();

    let (status, body) = send(&app, get(&format!("/api/scrape/stream/{}", id))).await;
    assert_eq!(status, StatusCode::OK);

    let text = String::from_utf8(body).unwrap();
    let progress_at = text.find("event: progress").unwrap();
    let complete_at = text.find("event: complete").unwrap();
    assert!(progress_at < complete_at);
    assert!(text.contains("\"status\":\"completed\""));
}
