//! Session handlers: password login and refresh-token rotation.

use axum::{extract::State, Form, Json};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::auth::{LoginForm, LoginResponse, RefreshRequest, RefreshResponse, UserInfo};
use crate::dtos::ErrorResponse;
use crate::utils::{Password, ValidatedJson};
use crate::AppState;

/// Log in with email and password.
///
/// POST /auth/token
#[utoipa::path(
    post,
    path = "/auth/token",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Incorrect username or password", body = ErrorResponse),
        (status = 403, description = "Account disabled", body = ErrorResponse),
        (status = 429, description = "Too many login attempts", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<LoginResponse>, AppError> {
    form.validate()?;

    let session = state
        .auth_service
        .login(&form.username, &Password::new(form.password))
        .await?;

    Ok(Json(LoginResponse {
        info: UserInfo { name: session.name },
        access_token: session.access_token,
        refresh_token: session.refresh_token,
        token_type: "bearer".to_string(),
        expires_in: state.auth_service.codec().access_token_expiry_seconds(),
    }))
}

/// Exchange a refresh token for a new access token.
///
/// PUT /auth/refresh_token
#[utoipa::path(
    put,
    path = "/auth/refresh_token",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed", body = RefreshResponse),
        (status = 400, description = "Invalid token target", body = ErrorResponse),
        (status = 401, description = "Refresh token invalid or expired", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    let access_token = state.auth_service.refresh(&req.refresh_token).await?;

    Ok(Json(RefreshResponse {
        message: "Successfully refreshed token.".to_string(),
        access_token,
        token_type: "bearer".to_string(),
    }))
}
