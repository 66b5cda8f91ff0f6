use std::sync::Arc;

use super::error::AuthError;
use super::identity_store::IdentityStore;
use super::ledger::RevocationLedger;
use super::token::{AccessClaims, Decoded, Expiry, RefreshClaims, TokenCodec, TokenType};
use crate::models::UserStatus;
use crate::utils::{case_insensitive, verify_password, Password, PasswordHashString};

/// Tokens handed out by a successful login.
#[derive(Debug, Clone)]
pub struct Session {
    pub name: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Ledger id of `access_token`, carried by `refresh_token` as `jti`.
    pub ledger_id: i64,
}

/// Login and refresh-token rotation.
#[derive(Clone)]
pub struct AuthService {
    codec: TokenCodec,
    ledger: Arc<dyn RevocationLedger>,
    identities: Arc<dyn IdentityStore>,
}

impl AuthService {
    pub fn new(
        codec: TokenCodec,
        ledger: Arc<dyn RevocationLedger>,
        identities: Arc<dyn IdentityStore>,
    ) -> Self {
        Self {
            codec,
            ledger,
            identities,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Check credentials and open a session.
    ///
    /// An unknown email and a wrong password fail the same way.
    pub async fn login(&self, email: &str, password: &Password) -> Result<Session, AuthError> {
        let email = case_insensitive(email);

        let identity = self
            .identities
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if identity.status == UserStatus::Disabled {
            tracing::warn!(user_id = identity.id, "Login attempt on disabled account");
            return Err(AuthError::AccountDisabled);
        }

        let stored = PasswordHashString::new(identity.hashed_password.clone());
        if !verify_password(password, &stored) {
            tracing::warn!(user_id = identity.id, "Login failed: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let access_token = self.codec.encode(
            &AccessClaims { sub: email },
            TokenType::AccessToken,
            Expiry::Default,
        )?;
        let record = self.ledger.insert(&access_token, None).await?;

        let refresh_token = self.codec.encode(
            &RefreshClaims {
                jti: record.id.to_string(),
            },
            TokenType::RefreshToken,
            Expiry::Default,
        )?;

        tracing::info!(user_id = identity.id, ledger_id = record.id, "Session opened");

        Ok(Session {
            name: identity.name,
            access_token,
            refresh_token,
            ledger_id: record.id,
        })
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// The ledger record named by `jti` is deleted and re-created under the
    /// same id with the new access token, so the refresh token keeps working
    /// while the access token behind it changes. Only the caller whose delete
    /// removed the record gets a token; everyone else sees
    /// `RevocationRecordMissing`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let refresh: Decoded<RefreshClaims> =
            self.codec
                .decode(refresh_token, TokenType::RefreshToken, false)?;
        let ledger_id: i64 = refresh
            .claims
            .jti
            .parse()
            .map_err(|_| AuthError::TokenInvalid)?;

        let record = self
            .ledger
            .get_by_id(ledger_id)
            .await?
            .ok_or(AuthError::RevocationRecordMissing)?;

        // The stored access token may have expired; that is what refresh is for.
        let previous: Decoded<AccessClaims> =
            self.codec.decode(&record.token, TokenType::AccessToken, true)?;

        // A concurrent rotation may have replaced the record since it was read.
        if !self.ledger.delete_if_token(ledger_id, &record.token).await? {
            tracing::warn!(ledger_id, "Refresh lost race for revocation record");
            return Err(AuthError::RevocationRecordMissing);
        }

        let access_token =
            self.codec
                .encode(&previous.claims, TokenType::AccessToken, Expiry::Default)?;
        self.ledger.insert(&access_token, Some(ledger_id)).await?;

        tracing::info!(ledger_id, "Access token rotated");

        Ok(access_token)
    }
}
