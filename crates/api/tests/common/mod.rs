#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use capplan_api::config::ServerConfig;
use capplan_api::router::build_app_router;
use capplan_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        database_max_connections: 5,
    }
}

/// Build the full application router with all middleware layers, using the
/// given database pool.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app_router(AppState {
        pool,
        config: Arc::new(test_config()),
    })
}

async fn send(app: Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

/// POST without a request body.
pub async fn post_empty(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri, None).await
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Plan fixtures
// ---------------------------------------------------------------------------

/// An assignment payload for person 7 on project 1.
pub fn assignment_json(pct: f64) -> serde_json::Value {
    serde_json::json!({
        "entity_type": "assignment",
        "project_id": 1,
        "person_id": 7,
        "role_id": 3,
        "allocation_percentage": pct,
        "start_date": "2026-01-01",
        "end_date": "2026-06-30"
    })
}

pub async fn create_baseline(pool: &PgPool) -> i64 {
    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/scenarios",
        serde_json::json!({"name": "Plan of record"}),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

pub async fn fork(pool: &PgPool, parent_id: i64, name: &str) -> i64 {
    let response = post_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/scenarios/{parent_id}/fork"),
        serde_json::json!({"name": name}),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

/// Write an assignment into a scenario and return the response.
pub async fn put_assignment(
    pool: &PgPool,
    scenario_id: i64,
    entity_id: Option<i64>,
    pct: f64,
) -> Response<Body> {
    put_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/scenarios/{scenario_id}/overlays/assignment"),
        serde_json::json!({"entity_id": entity_id, "data": assignment_json(pct)}),
    )
    .await
}

/// Add a new assignment to a scenario, returning its entity id.
pub async fn add_assignment(pool: &PgPool, scenario_id: i64, pct: f64) -> i64 {
    let response = put_assignment(pool, scenario_id, None, pct).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["data"]["entity_id"].as_i64().unwrap()
}

/// Allocation of an assignment in a scenario's effective state, `None` if
/// the scenario does not contain it.
pub async fn allocation(pool: &PgPool, scenario_id: i64, entity_id: i64) -> Option<f64> {
    let response = get(
        build_test_app(pool.clone()),
        &format!("/api/v1/scenarios/{scenario_id}/effective/assignment"),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let json = body_json(response).await;
    json["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["entity_id"].as_i64() == Some(entity_id))
        .map(|e| e["record"]["allocation_percentage"].as_f64().unwrap())
}

pub async fn merge(pool: &PgPool, source_id: i64, target_id: i64) -> serde_json::Value {
    let response = post_empty(
        build_test_app(pool.clone()),
        &format!("/api/v1/scenarios/{source_id}/merge/{target_id}"),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    body_json(response).await["data"].clone()
}

pub async fn scenario_status(pool: &PgPool, id: i64) -> String {
    let response = get(build_test_app(pool.clone()), &format!("/api/v1/scenarios/{id}")).await;
    body_json(response).await["data"]["status"]
        .as_str()
        .unwrap()
        .to_string()
}
