//! Revocation ledger rows and single-use token issuers.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use utoipa::ToSchema;

/// One live revocable token.
///
/// For a session, `token` is the access token and `id` is the value the
/// paired refresh token carries as `jti`. For invite/reset links, `token` is
/// the link token itself. A missing row means the token is not live.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RevocationRecord {
    pub id: i64,
    pub token: String,
}

/// `iss` tag of a single-use token, naming the flow that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TokenIssuer {
    /// Invited by an administrator.
    EmailInvite,
    /// Requested through the "forgot password" link.
    ForgotPassword,
}

impl TokenIssuer {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenIssuer::EmailInvite => "email_invite",
            TokenIssuer::ForgotPassword => "forgot_password",
        }
    }
}

impl fmt::Display for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
