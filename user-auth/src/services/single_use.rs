use chrono::{Duration, Utc};
use std::sync::Arc;

use super::error::AuthError;
use super::ledger::RevocationLedger;
use super::token::{Decoded, Expiry, SingleUseClaims, TokenCodec, TokenType};
use crate::models::TokenIssuer;

/// A link token that has been recorded in the ledger.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub record_id: i64,
}

/// Proof that a link token checked out. Hand it back to `consume` once the
/// side effect it guards has succeeded.
#[derive(Debug)]
pub struct Redemption {
    pub record_id: i64,
    pub subject: String,
}

/// Invite and password-reset links: ledger-backed tokens usable once.
#[derive(Clone)]
pub struct SingleUseTokenFlow {
    codec: TokenCodec,
    ledger: Arc<dyn RevocationLedger>,
}

impl SingleUseTokenFlow {
    pub fn new(codec: TokenCodec, ledger: Arc<dyn RevocationLedger>) -> Self {
        Self { codec, ledger }
    }

    pub async fn issue(
        &self,
        email: &str,
        issuer: TokenIssuer,
        window: Duration,
    ) -> Result<IssuedToken, AuthError> {
        let claims = SingleUseClaims {
            iat: Utc::now().timestamp(),
            iss: issuer,
            sub: email.to_string(),
        };
        let token = self
            .codec
            .encode(&claims, TokenType::AccessToken, Expiry::In(window))?;
        let record = self.ledger.insert(&token, None).await?;

        tracing::info!(issuer = %issuer, record_id = record.id, "Single-use token issued");

        Ok(IssuedToken {
            token,
            record_id: record.id,
        })
    }

    /// Check a presented link token without using it up.
    ///
    /// The stored copy is what gets decoded, so the presented token has to
    /// match it exactly. A token that was already used, was revoked, belongs
    /// to another flow or names another subject is `InvalidResetCode`.
    pub async fn redeem(
        &self,
        token: &str,
        expected_email: &str,
        issuer: TokenIssuer,
    ) -> Result<Redemption, AuthError> {
        let record = self
            .ledger
            .get_by_token(token)
            .await?
            .ok_or(AuthError::InvalidResetCode)?;

        let decoded: Decoded<SingleUseClaims> =
            self.codec
                .decode(&record.token, TokenType::AccessToken, false)?;

        if decoded.claims.iss != issuer || decoded.claims.sub != expected_email {
            tracing::warn!(record_id = record.id, issuer = %issuer, "Link token does not match request");
            return Err(AuthError::InvalidResetCode);
        }

        Ok(Redemption {
            record_id: record.id,
            subject: decoded.claims.sub,
        })
    }

    /// Use up a redeemed token. Fails if another request consumed it first.
    pub async fn consume(&self, redemption: Redemption) -> Result<(), AuthError> {
        if !self.ledger.delete(redemption.record_id).await? {
            return Err(AuthError::InvalidResetCode);
        }
        tracing::info!(record_id = redemption.record_id, "Single-use token consumed");
        Ok(())
    }

    /// Withdraw a token that was issued but never delivered.
    pub async fn revoke(&self, record_id: i64) -> Result<bool, AuthError> {
        self.ledger.delete(record_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::services::ledger::InMemoryLedger;
    use jsonwebtoken::Algorithm;
    use secrecy::Secret;

    fn flow() -> SingleUseTokenFlow {
        let codec = TokenCodec::new(&JwtConfig {
            secret: Secret::new("single-use-test".into()),
            algorithm: Algorithm::HS256,
            access_token_expiry_minutes: 15,
            refresh_token_expiry_minutes: 60,
        });
        SingleUseTokenFlow::new(codec, Arc::new(InMemoryLedger::new()))
    }

    #[tokio::test]
    async fn test_redeem_then_consume_once() {
        let flow = flow();
        let issued = flow
            .issue("ada@example.com", TokenIssuer::EmailInvite, Duration::days(1))
            .await
            .unwrap();

        let redemption = flow
            .redeem(&issued.token, "ada@example.com", TokenIssuer::EmailInvite)
            .await
            .unwrap();
        assert_eq!(redemption.record_id, issued.record_id);
        flow.consume(redemption).await.unwrap();

        let err = flow
            .redeem(&issued.token, "ada@example.com", TokenIssuer::EmailInvite)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidResetCode));
    }

    #[tokio::test]
    async fn test_redeem_without_consume_leaves_token_live() {
        let flow = flow();
        let issued = flow
            .issue("ada@example.com", TokenIssuer::ForgotPassword, Duration::minutes(60))
            .await
            .unwrap();

        flow.redeem(&issued.token, "ada@example.com", TokenIssuer::ForgotPassword)
            .await
            .unwrap();
        assert!(flow
            .redeem(&issued.token, "ada@example.com", TokenIssuer::ForgotPassword)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_subject_and_issuer_must_match() {
        let flow = flow();
        let issued = flow
            .issue("ada@example.com", TokenIssuer::EmailInvite, Duration::days(1))
            .await
            .unwrap();

        let other_user = flow
            .redeem(&issued.token, "eve@example.com", TokenIssuer::EmailInvite)
            .await
            .unwrap_err();
        let other_flow = flow
            .redeem(&issued.token, "ada@example.com", TokenIssuer::ForgotPassword)
            .await
            .unwrap_err();
        assert!(matches!(other_user, AuthError::InvalidResetCode));
        assert!(matches!(other_flow, AuthError::InvalidResetCode));
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let err = flow()
            .redeem("never-issued", "ada@example.com", TokenIssuer::EmailInvite)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidResetCode));
    }

    #[tokio::test]
    async fn test_revoked_token_is_gone() {
        let flow = flow();
        let issued = flow
            .issue("ada@example.com", TokenIssuer::EmailInvite, Duration::days(1))
            .await
            .unwrap();
        assert!(flow.revoke(issued.record_id).await.unwrap());

        let err = flow
            .redeem(&issued.token, "ada@example.com", TokenIssuer::EmailInvite)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidResetCode));
    }
}
