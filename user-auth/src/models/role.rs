//! Role model - the fixed, totally ordered role hierarchy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Role assigned to an identity through its permission record.
///
/// Ordering is fixed: `superadmin > administrator > developer_host > developer`.
/// `Undefined` marks a permission record whose role is missing and authorizes
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Superadmin,
    Administrator,
    DeveloperHost,
    Developer,
    #[serde(rename = "permission_missing")]
    Undefined,
}

/// Every assignable role, highest tier first.
const TIERS: [Role; 4] = [
    Role::Superadmin,
    Role::Administrator,
    Role::DeveloperHost,
    Role::Developer,
];

impl Role {
    /// Requirements this role satisfies: its own tier and every lower one.
    ///
    /// Kept as an explicit table rather than a rank comparison so the
    /// hierarchy can be read (and tested) at a glance.
    pub fn satisfies(self) -> &'static [Role] {
        match self {
            Role::Superadmin => &TIERS[0..],
            Role::Administrator => &TIERS[1..],
            Role::DeveloperHost => &TIERS[2..],
            Role::Developer => &TIERS[3..],
            Role::Undefined => &[],
        }
    }

    /// Whether an identity holding `self` may call an operation requiring `required`.
    pub fn authorizes(self, required: Role) -> bool {
        self.satisfies().contains(&required)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Administrator => "administrator",
            Role::DeveloperHost => "developer_host",
            Role::Developer => "developer",
            Role::Undefined => "permission_missing",
        }
    }

    /// All assignable roles, highest tier first.
    pub fn tiers() -> &'static [Role] {
        &TIERS
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "superadmin" => Ok(Role::Superadmin),
            "administrator" => Ok(Role::Administrator),
            "developer_host" => Ok(Role::DeveloperHost),
            "developer" => Ok(Role::Developer),
            "permission_missing" => Ok(Role::Undefined),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Role; 5] = [
        Role::Superadmin,
        Role::Administrator,
        Role::DeveloperHost,
        Role::Developer,
        Role::Undefined,
    ];

    fn rank(role: Role) -> Option<usize> {
        TIERS.iter().position(|r| *r == role)
    }

    #[test]
    fn test_role_matrix_follows_fixed_order() {
        for actual in ALL {
            for required in TIERS {
                let expected = match (rank(actual), rank(required)) {
                    (Some(a), Some(r)) => a <= r,
                    _ => false,
                };
                assert_eq!(
                    actual.authorizes(required),
                    expected,
                    "{} against requirement {}",
                    actual,
                    required
                );
            }
        }
    }

    #[test]
    fn test_undefined_authorizes_nothing() {
        for required in ALL {
            assert!(!Role::Undefined.authorizes(required));
        }
    }

    #[test]
    fn test_nothing_satisfies_undefined_requirement() {
        for actual in ALL {
            assert!(!actual.authorizes(Role::Undefined));
        }
    }

    #[test]
    fn test_superadmin_satisfies_every_tier() {
        assert_eq!(Role::Superadmin.satisfies(), Role::tiers());
        assert_eq!(Role::Developer.satisfies(), &[Role::Developer]);
    }

    #[test]
    fn test_role_string_roundtrip() {
        for role in ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_names() {
        assert_eq!(
            serde_json::to_string(&Role::DeveloperHost).unwrap(),
            "\"developer_host\""
        );
        assert_eq!(
            serde_json::from_str::<Role>("\"permission_missing\"").unwrap(),
            Role::Undefined
        );
    }
}
