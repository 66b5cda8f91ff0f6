//! Invite, password-reset and password-change handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::dtos::access::{
    ChangePasswordRequest, CompleteInviteRequest, CompleteInviteResponse, ForgotPasswordRequest,
    InviteFailureResponse, InviteRequest, InviteResponse, ResetPasswordRequest,
};
use crate::dtos::{ErrorResponse, MessageResponse};
use crate::middleware::CurrentIdentity;
use crate::services::{InviteBatch, Invitee};
use crate::utils::{case_insensitive, Password, ValidatedJson};
use crate::AppState;

/// Invite users by email.
///
/// Answers 206 when some invitees were skipped; they are listed in `failures`.
#[utoipa::path(
    post,
    path = "/access/email_invite",
    request_body = InviteRequest,
    responses(
        (status = 200, description = "All users invited", body = InviteResponse),
        (status = 206, description = "Some users could not be invited", body = InviteResponse),
        (status = 400, description = "Malformed batch", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    ),
    tag = "Access",
    security(("bearer_auth" = []))
)]
pub async fn invite_users(
    State(state): State<AppState>,
    CurrentIdentity(inviter): CurrentIdentity,
    ValidatedJson(req): ValidatedJson<InviteRequest>,
) -> Result<(StatusCode, Json<InviteResponse>), AppError> {
    let batch = InviteBatch {
        users: req
            .users
            .into_iter()
            .map(|u| Invitee {
                name: u.name,
                email: u.email,
            })
            .collect(),
        link_expiration_days: req.link_expiration_days,
        default_password: Password::new(req.default_password),
        role: req.role,
        subject: req.subject,
        body: req.body,
    };

    let outcome = state.account_service.invite_users(&inviter, batch).await?;

    let status = if outcome.is_complete() {
        StatusCode::OK
    } else {
        StatusCode::PARTIAL_CONTENT
    };

    Ok((
        status,
        Json(InviteResponse {
            message: outcome.message(),
            success: outcome.is_complete(),
            failures: outcome
                .failures
                .into_iter()
                .map(|f| InviteFailureResponse {
                    status: f.status,
                    email: f.email,
                })
                .collect(),
        }),
    ))
}

/// Complete an invitation with the link token from the invite email.
#[utoipa::path(
    patch,
    path = "/access/email_invite/{token}",
    params(("token" = String, Path, description = "Token from the invitation link")),
    request_body = CompleteInviteRequest,
    responses(
        (status = 200, description = "Invitation completed", body = CompleteInviteResponse),
        (status = 400, description = "Invalid reset code or password", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Access"
)]
pub async fn complete_invite(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ValidatedJson(req): ValidatedJson<CompleteInviteRequest>,
) -> Result<Json<CompleteInviteResponse>, AppError> {
    let user_id = state
        .account_service
        .complete_invite(&token, &req.email, &req.name, &Password::new(req.password))
        .await?;

    Ok(Json(CompleteInviteResponse {
        message: "User completed successfully".to_string(),
        user_id,
    }))
}

/// Send a password reset link.
#[utoipa::path(
    post,
    path = "/access/forgot_password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset email sent", body = MessageResponse),
        (status = 400, description = "Invalid email", body = ErrorResponse),
        (status = 403, description = "Account disabled", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 503, description = "Email could not be delivered", body = ErrorResponse)
    ),
    tag = "Access"
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.account_service.forgot_password(&req.email).await?;

    Ok(Json(MessageResponse::new(format!(
        "Reset password email sent to {}",
        case_insensitive(&req.email)
    ))))
}

/// Set a new password with the token from the reset email.
#[utoipa::path(
    patch,
    path = "/access/forgot_password/{token}",
    params(("token" = String, Path, description = "Token from the reset link")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid reset code or password", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Access"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .account_service
        .reset_password(&token, &req.email, &Password::new(req.new_password))
        .await?;

    Ok(Json(MessageResponse::new(format!(
        "Password reset for {} successfully",
        case_insensitive(&req.email)
    ))))
}

/// Change the caller's password.
#[utoipa::path(
    patch,
    path = "/access/change_password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "New password rejected", body = ErrorResponse),
        (status = 401, description = "Old password is incorrect", body = ErrorResponse)
    ),
    tag = "Access",
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .account_service
        .change_password(
            &identity,
            &Password::new(req.old_password),
            &Password::new(req.new_password),
        )
        .await?;

    Ok(Json(MessageResponse::new("Password changed successfully")))
}
