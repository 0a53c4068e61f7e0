// Integration tests for registration, login and sessions

mod common;

use axum::http::StatusCode;
use common::{register, send, test_app};
use serde_json::json;

#[tokio::test]
async fn test_register_returns_user_and_token() {
    let app = test_app();

    let (status, body) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({"name": "Ann", "email": "Ann@Example.com", "password": "secret1"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["name"], "Ann");
    assert_eq!(body["user"]["email"], "ann@example.com");
    assert!(body["user"].get("passwordHash").is_none());
    assert!(body["user"]["createdAt"].is_string());
    assert!(!body["token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = test_app();
    register(&app, "Ann").await;

    let (status, body) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({"name": "Other Ann", "email": "ANN@example.com", "password": "secret1"})),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Email already registered");
}

#[tokio::test]
async fn test_register_validation_errors() {
    let app = test_app();

    let (status, body) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({"name": "", "email": "not-an-email", "password": "123"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["name", "email", "password"]);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = test_app();

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header("Content-Type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_and_me() {
    let app = test_app();
    let (_, user_id) = register(&app, "Ann").await;

    let (status, body) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"email": "ann@example.com", "password": "secret1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user_id.as_str());
}

#[tokio::test]
async fn test_login_wrong_password_and_unknown_email() {
    let app = test_app();
    register(&app, "Ann").await;

    for payload in [
        json!({"email": "ann@example.com", "password": "wrong-password"}),
        json!({"email": "nobody@example.com", "password": "secret1"}),
    ] {
        let (status, body) = send(&app, "POST", "/auth/login", None, Some(payload)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");
    }
}

#[tokio::test]
async fn test_me_requires_token() {
    let app = test_app();

    let (status, body) = send(&app, "GET", "/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized");

    let (status, _) = send(&app, "GET", "/auth/me", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let app = test_app();
    let (token, _) = register(&app, "Ann").await;

    let (status, body) = send(&app, "POST", "/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = send(&app, "GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_reports_ephemeral_database() {
    let app = test_app();

    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["message"], "Service is healthy");
    assert_eq!(body["environment"], "test");
    assert_eq!(body["database"]["status"], "ephemeral");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}
