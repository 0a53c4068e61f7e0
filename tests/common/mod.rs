// Shared helpers for router-level tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use eventhub::api::{create_router, AppState};
use eventhub::config::AppConfig;
use eventhub::db::Database;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.environment = "test".to_string();
    config
}

pub fn test_app() -> Router {
    test_app_with(test_config())
}

pub fn test_app_with(config: AppConfig) -> Router {
    let database = Database::in_memory().expect("in-memory db failed");
    create_router(AppState::new(Arc::new(database), &config))
}

/// Sends one request, returning status and JSON body (`Null` when empty).
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Registers a user and returns (token, user id).
pub async fn register(app: &Router, name: &str) -> (String, String) {
    let (status, body) = send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "name": name,
            "email": format!("{}@example.com", name.to_lowercase()),
            "password": "secret1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

/// Creates an event as `token` and returns its id.
pub async fn create_event(app: &Router, token: &str, title: &str, capacity: u32) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/events",
        Some(token),
        Some(json!({
            "title": title,
            "startTime": "2030-09-01T18:00:00Z",
            "endTime": "2030-09-01T21:00:00Z",
            "capacity": capacity,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create event failed: {}", body);
    body["event"]["id"].as_str().unwrap().to_string()
}
