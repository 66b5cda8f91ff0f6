pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    http::{header, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post, put},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{openapi::security::SecurityScheme, Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{AuthConfig, SwaggerMode};
use crate::middleware::{role_guard_middleware, RoleGuard};
use crate::models::Role;
use crate::services::{
    AccessGate, AccountService, AuthService, EmailProvider, IdentityStore, RevocationLedger,
    SingleUseTokenFlow, TokenCodec,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::access::invite_users,
        handlers::access::complete_invite,
        handlers::access::forgot_password,
        handlers::access::reset_password,
        handlers::access::change_password,
        handlers::user::get_me,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::auth::LoginForm,
            dtos::auth::LoginResponse,
            dtos::auth::UserInfo,
            dtos::auth::RefreshRequest,
            dtos::auth::RefreshResponse,
            dtos::access::InviteeRequest,
            dtos::access::InviteRequest,
            dtos::access::InviteFailureResponse,
            dtos::access::InviteResponse,
            dtos::access::CompleteInviteRequest,
            dtos::access::CompleteInviteResponse,
            dtos::access::ForgotPasswordRequest,
            dtos::access::ResetPasswordRequest,
            dtos::access::ChangePasswordRequest,
            models::IdentityResponse,
            models::Role,
            models::UserStatus,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Login and token refresh"),
        (name = "Access", description = "Invites, password reset and password change"),
        (name = "Users", description = "Current user"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: AuthConfig,
    pub ledger: Arc<dyn RevocationLedger>,
    pub auth_service: AuthService,
    pub account_service: AccountService,
    pub gate: AccessGate,
    pub login_rate_limiter: IpRateLimiter,
    pub password_reset_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire the flows onto the given collaborators.
    pub fn new(
        config: AuthConfig,
        ledger: Arc<dyn RevocationLedger>,
        identities: Arc<dyn IdentityStore>,
        email: Arc<dyn EmailProvider>,
    ) -> Self {
        let codec = TokenCodec::new(&config.jwt);
        let links = SingleUseTokenFlow::new(codec.clone(), ledger.clone());

        let auth_service = AuthService::new(codec.clone(), ledger.clone(), identities.clone());
        let account_service =
            AccountService::new(identities.clone(), links, email, config.links.clone());
        let gate = AccessGate::new(codec, identities);

        let limits = &config.rate_limit;
        let login_rate_limiter =
            create_ip_rate_limiter(limits.login_attempts, limits.login_window_seconds);
        let password_reset_rate_limiter = create_ip_rate_limiter(
            limits.password_reset_attempts,
            limits.password_reset_window_seconds,
        );

        Self {
            config,
            ledger,
            auth_service,
            account_service,
            gate,
            login_rate_limiter,
            password_reset_rate_limiter,
        }
    }

    fn guard(&self, required: Role) -> RoleGuard {
        RoleGuard::new(self.gate.clone(), required)
    }
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let login_route = Router::new()
        .route("/auth/token", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let forgot_password_route = Router::new()
        .route(
            "/access/forgot_password",
            post(handlers::access::forgot_password),
        )
        .layer(from_fn_with_state(
            state.password_reset_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let administrator_routes = Router::new()
        .route(
            "/access/email_invite",
            post(handlers::access::invite_users),
        )
        .route_layer(from_fn_with_state(
            state.guard(Role::Administrator),
            role_guard_middleware,
        ));

    let developer_routes = Router::new()
        .route(
            "/access/change_password",
            patch(handlers::access::change_password),
        )
        .route("/users/me", get(handlers::user::get_me))
        .route_layer(from_fn_with_state(
            state.guard(Role::Developer),
            role_guard_middleware,
        ));

    let mut app = Router::new().route("/health", get(health_check));

    app = match state.config.swagger.enabled {
        SwaggerMode::Public => {
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()))
        }
        SwaggerMode::Disabled => app,
    };

    let allowed_origins = state
        .config
        .security
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect::<Vec<HeaderValue>>();

    let app = app
        .route("/auth/refresh_token", put(handlers::auth::refresh))
        .route(
            "/access/email_invite/:token",
            patch(handlers::access::complete_invite),
        )
        .route(
            "/access/forgot_password/:token",
            patch(handlers::access::reset_password),
        )
        .merge(login_route)
        .merge(forgot_password_route)
        .merge(administrator_routes)
        .merge(developer_routes)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        );

    Ok(app)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Service is unhealthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.ledger.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Ledger health check failed");
        AppError::ServiceUnavailable("Revocation ledger unavailable".to_string())
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "ledger": "up"
        }
    })))
}
