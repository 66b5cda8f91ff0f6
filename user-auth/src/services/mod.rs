//! Services layer for user-auth.
//!
//! Token handling, the revocation ledger, role checks and the account
//! flows built on them, plus the collaborators they talk to.

pub mod access;
pub mod account;
pub mod auth;
pub mod email;
pub mod error;
pub mod identity_store;
pub mod ledger;
pub mod single_use;
pub mod token;

pub use access::{check_identity, AccessGate};
pub use account::{AccountService, InviteBatch, InviteFailure, InviteOutcome, Invitee};
pub use auth::{AuthService, Session};
pub use email::{EmailProvider, MockEmailService, SentEmail, SmtpEmailService};
pub use error::AuthError;
pub use identity_store::{IdentityStore, InMemoryIdentityStore, PgIdentityStore};
pub use ledger::{InMemoryLedger, PgRevocationLedger, RevocationLedger};
pub use single_use::{IssuedToken, Redemption, SingleUseTokenFlow};
pub use token::{
    AccessClaims, Decoded, Expiry, RefreshClaims, SingleUseClaims, TokenCodec, TokenType,
};
