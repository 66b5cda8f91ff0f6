//! Identity model - user accounts as seen by the auth core.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use super::Role;

/// Account state.
///
/// `Disabled` blocks every authenticated call. `Incomplete` blocks
/// everything except the invite-completion and password-reset flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Enabled,
    Disabled,
    Incomplete,
    Active,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Enabled => "enabled",
            UserStatus::Disabled => "disabled",
            UserStatus::Incomplete => "incomplete",
            UserStatus::Active => "active",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enabled" => Ok(UserStatus::Enabled),
            "disabled" => Ok(UserStatus::Disabled),
            "incomplete" => Ok(UserStatus::Incomplete),
            "active" => Ok(UserStatus::Active),
            _ => Err(format!("Invalid user status: {}", s)),
        }
    }
}

/// A user account. Emails are stored case-folded.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub status: UserStatus,
    /// Role from the linked permission record; `None` when no record exists.
    pub role: Option<Role>,
    pub hashed_password: String,
}

impl Identity {
    /// Convert to response (no password hash).
    pub fn sanitized(&self) -> IdentityResponse {
        IdentityResponse {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            status: self.status,
            role: self.role,
        }
    }
}

/// Row shape of `users LEFT JOIN permissions`.
#[derive(Debug, FromRow)]
pub struct IdentityRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub status: String,
    pub role: Option<String>,
    pub hashed_password: String,
}

impl TryFrom<IdentityRow> for Identity {
    type Error = String;

    fn try_from(row: IdentityRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            status: row.status.parse()?,
            role: row.role.map(|r| r.parse()).transpose()?,
            hashed_password: row.hashed_password,
        })
    }
}

/// Values for a new account, created by the invite flow.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub status: UserStatus,
    pub role: Role,
}

/// Partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct IdentityUpdate {
    pub name: Option<String>,
    pub hashed_password: Option<String>,
    pub status: Option<UserStatus>,
}

impl IdentityUpdate {
    pub fn status(status: UserStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.hashed_password.is_none() && self.status.is_none()
    }
}

/// Identity response for API (without sensitive fields).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IdentityResponse {
    #[schema(example = 42)]
    pub id: i64,
    #[schema(example = "Ada Lovelace")]
    pub name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    pub status: UserStatus,
    pub role: Option<Role>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, role: Option<&str>) -> IdentityRow {
        IdentityRow {
            id: 7,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            status: status.to_string(),
            role: role.map(str::to_string),
            hashed_password: "$argon2id$...".to_string(),
        }
    }

    #[test]
    fn test_row_conversion() {
        let identity = Identity::try_from(row("incomplete", Some("developer_host"))).unwrap();
        assert_eq!(identity.status, UserStatus::Incomplete);
        assert_eq!(identity.role, Some(Role::DeveloperHost));

        let identity = Identity::try_from(row("enabled", None)).unwrap();
        assert_eq!(identity.role, None);
    }

    #[test]
    fn test_row_conversion_rejects_unknown_values() {
        assert!(Identity::try_from(row("banned", None)).is_err());
        assert!(Identity::try_from(row("enabled", Some("owner"))).is_err());
    }

    #[test]
    fn test_sanitized_omits_password_hash() {
        let identity = Identity::try_from(row("enabled", Some("developer"))).unwrap();
        let json = serde_json::to_value(identity.sanitized()).unwrap();
        assert!(json.get("hashed_password").is_none());
        assert_eq!(json["status"], "enabled");
        assert_eq!(json["role"], "developer");
    }
}
