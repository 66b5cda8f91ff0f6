//! Health, response headers, rate limiting and API docs.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{get_request, test_config, TestApp, TEST_PASSWORD};
use tower::util::ServiceExt;
use user_auth::{
    config::{SwaggerMode, MAX_TOKEN_EXPIRE_MINUTES},
    models::{Role, UserStatus},
};

#[tokio::test]
async fn health_check_returns_200() {
    let app = TestApp::spawn();

    let (status, body) = app.send(get_request("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "user-auth-test");
    assert_eq!(body["checks"]["ledger"], "up");
}

#[tokio::test]
async fn responses_carry_security_headers_and_request_id() {
    let app = TestApp::spawn();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers.get("x-request-id").unwrap(), "req-123");
    assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
    assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
    assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");
}

#[tokio::test]
async fn login_is_rate_limited_per_client() {
    let mut config = test_config();
    config.rate_limit.login_attempts = 2;
    config.rate_limit.login_window_seconds = 3600;
    let app = TestApp::with_config(config);
    app.seed_user("ada@example.com", Some(Role::Developer), UserStatus::Enabled);

    let attempt = |ip: &str| {
        Request::builder()
            .method("POST")
            .uri("/auth/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("x-forwarded-for", ip)
            .body(Body::from(format!(
                "username=ada%40example.com&password={TEST_PASSWORD}"
            )))
            .unwrap()
    };

    let (first, _) = app.send(attempt("203.0.113.7")).await;
    let (second, _) = app.send(attempt("203.0.113.7")).await;
    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(attempt("203.0.113.7"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    let (other_client, _) = app.send(attempt("198.51.100.1")).await;
    assert_eq!(other_client, StatusCode::OK);
}

#[tokio::test]
async fn docs_are_served_only_when_enabled() {
    let app = TestApp::spawn();
    let (status, _) = app
        .send(get_request("/.well-known/openapi.json", None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let mut config = test_config();
    config.swagger.enabled = SwaggerMode::Public;
    let app = TestApp::with_config(config);

    let (status, body) = app
        .send(get_request("/.well-known/openapi.json", None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"].get("/auth/token").is_some());
    assert!(body["paths"].get("/access/email_invite/{token}").is_some());
    assert!(body["components"]["securitySchemes"]
        .get("bearer_auth")
        .is_some());
}

#[test]
fn config_rejects_unrepresentable_token_lifetimes() {
    let mut config = test_config();
    config.common.port = 8000;
    assert!(config.validate().is_ok());

    config.jwt.access_token_expiry_minutes = i64::MAX;
    assert!(config.validate().is_err());

    config.jwt.access_token_expiry_minutes = 15;
    config.jwt.refresh_token_expiry_minutes = MAX_TOKEN_EXPIRE_MINUTES + 1;
    assert!(config.validate().is_err());
}
