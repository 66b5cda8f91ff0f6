use axum::Json;

use crate::dtos::ErrorResponse;
use crate::middleware::CurrentIdentity;
use crate::models::IdentityResponse;

/// The identity behind the bearer token.
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Current identity", body = IdentityResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 412, description = "Account setup is incomplete", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn get_me(CurrentIdentity(identity): CurrentIdentity) -> Json<IdentityResponse> {
    Json(identity.sanitized())
}
