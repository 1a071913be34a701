use chrono::{DateTime, Utc};
use serde::Serialize;

use rolegate_core::{AuditStamp, DomainError, DomainResult, Entity, RoleId, UserId};

/// Name of the reserved administrator role (always `RoleId::ADMIN`).
pub const ADMIN_ROLE: &str = "admin";

/// Role every self-registered user receives, when it exists.
pub const DEFAULT_USER_ROLE: &str = "users";

/// A named bundle of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    pub audit: AuditStamp,
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn audit(&self) -> &AuditStamp {
        &self.audit
    }
}

impl Role {
    pub fn from_draft(id: RoleId, draft: RoleDraft, now: DateTime<Utc>, actor: Option<UserId>) -> Self {
        Self {
            id,
            name: draft.name,
            description: draft.description,
            audit: AuditStamp::new(now, actor),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.id == RoleId::ADMIN
    }
}

/// Validated name/description pair for creating or updating a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDraft {
    pub name: String,
    pub description: String,
}

impl RoleDraft {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> DomainResult<Self> {
        Ok(Self {
            name: validate_length("name", name.into(), 2, 30)?,
            description: validate_length("description", description.into(), 2, 120)?,
        })
    }
}

/// Trim `value` and check its character count lies in `min..=max`.
pub(crate) fn validate_length(
    field: &str,
    value: String,
    min: usize,
    max: usize,
) -> DomainResult<String> {
    let value = value.trim().to_string();
    let len = value.chars().count();
    if len < min || len > max {
        return Err(DomainError::validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_trims_and_validates() {
        let draft = RoleDraft::new("  editor ", "Edits things").unwrap();
        assert_eq!(draft.name, "editor");

        assert!(matches!(
            RoleDraft::new("x", "too short name"),
            Err(DomainError::Validation(_))
        ));
        assert!(RoleDraft::new("editor", "x".repeat(121)).is_err());
        assert!(RoleDraft::new("a".repeat(30), "ok").is_ok());
    }
}
