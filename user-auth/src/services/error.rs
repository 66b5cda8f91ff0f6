use service_core::error::AppError;
use thiserror::Error;

/// Failure kinds of the auth flows.
///
/// Every flow returns one of these; the HTTP layer decides how it is shown.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Account setup is incomplete")]
    AccountIncomplete,

    #[error("Not authenticated")]
    MissingToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Could not validate credentials")]
    TokenInvalid,

    #[error("Unexpected token type")]
    TokenTypeMismatch,

    #[error("Invalid token target")]
    RevocationRecordMissing,

    #[error("Invalid reset code")]
    InvalidResetCode,

    #[error("Old password is incorrect")]
    IncorrectPassword,

    #[error("Insufficient role for this operation")]
    InsufficientRole,

    #[error("Identity {0} has no role assigned")]
    IdentityMissingRole(i64),

    #[error("User not found")]
    UserNotFound,

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("Email delivery failed: {0}")]
    EmailDelivery(String),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::InvalidCredentials
            | AuthError::RevocationRecordMissing
            | AuthError::InvalidResetCode
            | AuthError::Validation(_) => AppError::BadRequest(anyhow::anyhow!(message)),
            AuthError::MissingToken
            | AuthError::IncorrectPassword
            | AuthError::TokenExpired
            | AuthError::TokenInvalid
            | AuthError::TokenTypeMismatch => AppError::Unauthorized(anyhow::anyhow!(message)),
            AuthError::AccountDisabled | AuthError::InsufficientRole => {
                AppError::Forbidden(anyhow::anyhow!(message))
            }
            AuthError::AccountIncomplete => AppError::PreconditionFailed(anyhow::anyhow!(message)),
            AuthError::UserNotFound => AppError::NotFound(anyhow::anyhow!(message)),
            AuthError::UserAlreadyExists => AppError::Conflict(anyhow::anyhow!(message)),
            AuthError::EmailDelivery(_) => {
                tracing::error!(error = %message, "Email delivery failed");
                AppError::ServiceUnavailable("Email could not be delivered".to_string())
            }
            AuthError::IdentityMissingRole(_) => AppError::InternalError(anyhow::anyhow!(message)),
            AuthError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            AuthError::Internal(e) => AppError::InternalError(e),
        }
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::EmailError(msg) => AuthError::EmailDelivery(msg),
            other => AuthError::Internal(anyhow::anyhow!(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn status(err: AuthError) -> StatusCode {
        AppError::from(err).status_code()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status(AuthError::InvalidCredentials), StatusCode::BAD_REQUEST);
        assert_eq!(status(AuthError::RevocationRecordMissing), StatusCode::BAD_REQUEST);
        assert_eq!(status(AuthError::InvalidResetCode), StatusCode::BAD_REQUEST);
        assert_eq!(status(AuthError::TokenExpired), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::TokenInvalid), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::TokenTypeMismatch), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::MissingToken), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::IncorrectPassword), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::AccountDisabled), StatusCode::FORBIDDEN);
        assert_eq!(status(AuthError::InsufficientRole), StatusCode::FORBIDDEN);
        assert_eq!(status(AuthError::AccountIncomplete), StatusCode::PRECONDITION_FAILED);
        assert_eq!(status(AuthError::UserNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status(AuthError::UserAlreadyExists), StatusCode::CONFLICT);
        assert_eq!(
            status(AuthError::IdentityMissingRole(7)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(AuthError::EmailDelivery("smtp down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_email_error_maps_to_delivery() {
        let err: AuthError = AppError::EmailError("relay refused".into()).into();
        assert!(matches!(err, AuthError::EmailDelivery(msg) if msg == "relay refused"));
    }
}
