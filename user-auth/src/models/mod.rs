pub mod identity;
pub mod revocation_record;
pub mod role;

pub use identity::{Identity, IdentityResponse, IdentityRow, IdentityUpdate, NewIdentity, UserStatus};
pub use revocation_record::{RevocationRecord, TokenIssuer};
pub use role::Role;
