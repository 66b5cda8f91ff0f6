//! Shared setup for user-auth integration tests.
//!
//! Everything runs against the in-memory ledger, identity store and mailer,
//! so no database or SMTP server is needed.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use jsonwebtoken::Algorithm;
use secrecy::Secret;
use std::sync::Arc;
use tower::util::ServiceExt;
use user_auth::{
    build_router,
    config::{
        AuthConfig, DatabaseConfig, Environment, JwtConfig, LinkConfig, RateLimitConfig,
        SecurityConfig, SmtpConfig, SwaggerConfig, SwaggerMode,
    },
    models::{Identity, Role, UserStatus},
    services::{InMemoryIdentityStore, InMemoryLedger, MockEmailService},
    utils::{hash_password, Password},
    AppState,
};

pub const TEST_PASSWORD: &str = "correct4horse";
pub const RESET_PAGE: &str = "https://panel.example.com/reset-password";

pub fn test_config() -> AuthConfig {
    AuthConfig {
        common: service_core::config::Config {
            host: std::net::IpAddr::from([127, 0, 0, 1]),
            port: 0,
        },
        environment: Environment::Dev,
        service_name: "user-auth-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: Secret::new("postgres://unused".to_string()),
            max_connections: 1,
            min_connections: 1,
        },
        jwt: JwtConfig {
            secret: Secret::new("integration-test-secret".to_string()),
            algorithm: Algorithm::HS256,
            access_token_expiry_minutes: 15,
            refresh_token_expiry_minutes: 60,
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            port: 25,
            user: "mailer".to_string(),
            password: Secret::new("unused".to_string()),
            from: "noreply@example.com".to_string(),
        },
        links: LinkConfig {
            control_panel_url: "https://panel.example.com/".to_string(),
            reset_password_path: "/reset-password".to_string(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["https://panel.example.com".to_string()],
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Disabled,
        },
        rate_limit: RateLimitConfig {
            login_attempts: 1000,
            login_window_seconds: 60,
            password_reset_attempts: 1000,
            password_reset_window_seconds: 60,
        },
    }
}

/// App wired onto in-memory collaborators the test can inspect.
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub ledger: Arc<InMemoryLedger>,
    pub identities: Arc<InMemoryIdentityStore>,
    pub email: Arc<MockEmailService>,
    next_id: std::sync::atomic::AtomicI64,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AuthConfig) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let identities = Arc::new(InMemoryIdentityStore::new());
        let email = Arc::new(MockEmailService::new());

        let state = AppState::new(config, ledger.clone(), identities.clone(), email.clone());
        let router = build_router(state.clone()).expect("Failed to build router");

        Self {
            state,
            router,
            ledger,
            identities,
            email,
            next_id: std::sync::atomic::AtomicI64::new(1000),
        }
    }

    /// Seed an account with `TEST_PASSWORD`.
    pub fn seed_user(&self, email: &str, role: Option<Role>, status: UserStatus) -> Identity {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let identity = Identity {
            id,
            name: format!("User {id}"),
            email: email.to_lowercase(),
            status,
            role,
            hashed_password: hash_password(&Password::new(TEST_PASSWORD))
                .expect("Failed to hash password")
                .into_string(),
        };
        self.identities
            .insert(identity.clone())
            .expect("Failed to seed identity");
        identity
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, body)
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/auth/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!(
                "username={}&password={}",
                form_escape(email),
                form_escape(password)
            )))
            .unwrap();
        self.send(request).await
    }

    /// Log in and return `(access_token, refresh_token)`.
    pub async fn tokens_for(&self, email: &str) -> (String, String) {
        let (status, body) = self.login(email, TEST_PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        (
            body["access_token"].as_str().unwrap().to_string(),
            body["refresh_token"].as_str().unwrap().to_string(),
        )
    }
}

pub fn json_request(
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Pull the `t=` token out of a link in a mailed body.
pub fn link_token(body: &str) -> String {
    let start = body
        .find("?t=")
        .or_else(|| body.find("&t="))
        .expect("No token in email body")
        + 3;
    body[start..]
        .chars()
        .take_while(|c| !matches!(c, '&' | '"' | '<' | ' ' | '\n'))
        .collect()
}

fn form_escape(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('+', "%2B")
        .replace('&', "%26")
        .replace('@', "%40")
        .replace(' ', "+")
}
