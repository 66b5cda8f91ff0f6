use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::Role;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct InviteeRequest {
    #[schema(example = "Ada Lovelace")]
    pub name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
}

fn default_role() -> Role {
    Role::Developer
}

fn default_subject() -> String {
    "Control Panel Invitation".to_string()
}

fn default_body() -> String {
    "Hello {{name}},\nYou have been invited to join the Control Panel.\nPlease click the link below to finish creating your account.".to_string()
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InviteRequest {
    pub users: Vec<InviteeRequest>,

    /// How long the invite links stay valid, 1 to 366 days.
    #[schema(example = 7)]
    pub link_expiration_days: i64,

    #[validate(length(min = 1, message = "Default password is required"))]
    #[schema(example = "Welcome2024")]
    pub default_password: String,

    #[serde(default = "default_role")]
    pub role: Role,

    /// `{{name}}` and `{{email}}` are replaced per invitee.
    #[serde(default = "default_subject")]
    pub subject: String,

    #[serde(default = "default_body")]
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InviteFailureResponse {
    #[schema(example = 409)]
    pub status: u16,
    #[schema(example = "taken@example.com")]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InviteResponse {
    #[schema(example = "2 of 3 users invited successfully")]
    pub message: String,
    pub success: bool,
    pub failures: Vec<InviteFailureResponse>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CompleteInviteRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "ada@example.com")]
    pub email: String,

    #[validate(length(min = 1, max = 255, message = "Name must be provided"))]
    #[schema(example = "Ada Lovelace")]
    pub name: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "analytical1engine")]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompleteInviteResponse {
    #[schema(example = "User completed successfully")]
    pub message: String,
    #[schema(example = 42)]
    pub user_id: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    #[schema(example = "ada@example.com")]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    #[schema(example = "ada@example.com")]
    pub email: String,

    #[validate(length(min = 1, message = "New password is required"))]
    #[schema(example = "analytical2engine")]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Old password is required"))]
    #[schema(example = "analytical1engine")]
    pub old_password: String,

    #[validate(length(min = 1, message = "New password is required"))]
    #[schema(example = "analytical2engine")]
    pub new_password: String,
}
