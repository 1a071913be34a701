//! Strongly-typed identifiers used across the domain.
//!
//! Identifiers are store-assigned 64-bit integers (the relational schema uses
//! `BIGSERIAL`), wrapped so a role id can never be passed where a user id is
//! expected.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a user account.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

/// Identifier of a role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(i64);

/// Identifier of a permission.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(i64);

macro_rules! impl_int_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                if value <= 0 {
                    return Err(DomainError::invalid_id(format!(
                        "{}: must be positive, got {}",
                        $name, value
                    )));
                }
                Ok(Self(value))
            }
        }
    };
}

impl_int_newtype!(UserId, "UserId");
impl_int_newtype!(RoleId, "RoleId");
impl_int_newtype!(PermissionId, "PermissionId");

impl RoleId {
    /// The seeded administrator role. Reserved: never deleted, granted to
    /// configured admin addresses.
    pub const ADMIN: RoleId = RoleId(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positive_ids() {
        let id: UserId = "42".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn rejects_non_positive_and_garbage() {
        assert!("0".parse::<RoleId>().is_err());
        assert!("-3".parse::<RoleId>().is_err());

        let err = "abc".parse::<PermissionId>().unwrap_err();
        assert!(err.to_string().contains("PermissionId"));
    }

    #[test]
    fn admin_role_is_id_one() {
        assert_eq!(RoleId::ADMIN.get(), 1);
    }
}
