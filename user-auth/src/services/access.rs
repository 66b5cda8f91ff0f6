use serde::Deserialize;
use std::sync::Arc;

use super::error::AuthError;
use super::identity_store::IdentityStore;
use super::token::{Decoded, TokenCodec, TokenType};
use crate::models::{Identity, Role, TokenIssuer, UserStatus};

/// Access-token claims as the gate reads them. Link tokens share the access
/// type but carry `iss`, and are never accepted as bearer credentials.
#[derive(Debug, Deserialize)]
struct BearerClaims {
    sub: String,
    #[serde(default)]
    iss: Option<TokenIssuer>,
}

/// Per-request check that a bearer may call an operation needing `required`.
#[derive(Clone)]
pub struct AccessGate {
    codec: TokenCodec,
    identities: Arc<dyn IdentityStore>,
}

impl AccessGate {
    pub fn new(codec: TokenCodec, identities: Arc<dyn IdentityStore>) -> Self {
        Self { codec, identities }
    }

    /// Decode the bearer token, load its identity and authorize it.
    pub async fn authorize(&self, token: &str, required: Role) -> Result<Identity, AuthError> {
        let decoded: Decoded<BearerClaims> =
            self.codec.decode(token, TokenType::AccessToken, false)?;
        if decoded.claims.iss.is_some() {
            return Err(AuthError::TokenInvalid);
        }

        let identity = self
            .identities
            .find_by_email(&decoded.claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        check_identity(&identity, required)?;
        Ok(identity)
    }
}

/// Account-state and role checks, in order.
pub fn check_identity(identity: &Identity, required: Role) -> Result<(), AuthError> {
    match identity.status {
        UserStatus::Disabled => return Err(AuthError::AccountDisabled),
        UserStatus::Incomplete => return Err(AuthError::AccountIncomplete),
        UserStatus::Enabled | UserStatus::Active => {}
    }

    let role = match identity.role {
        Some(role) if role != Role::Undefined => role,
        other => {
            tracing::error!(
                target: "integrity",
                user_id = identity.id,
                role = ?other,
                "Identity has no role assigned"
            );
            return Err(AuthError::IdentityMissingRole(identity.id));
        }
    };

    if !role.authorizes(required) {
        tracing::debug!(user_id = identity.id, role = %role, required = %required, "Role check failed");
        return Err(AuthError::InsufficientRole);
    }

    Ok(())
}
