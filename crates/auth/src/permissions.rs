use chrono::{DateTime, Utc};
use serde::Serialize;

use rolegate_core::{AuditStamp, DomainError, DomainResult, Entity, PermissionId, UserId};

use crate::roles::validate_length;

pub const DEFAULT_COLOR: &str = "#ffffff";

/// A named capability that roles can be linked to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub description: String,
    /// Display color, `#rrggbb`.
    pub color: String,
    pub audit: AuditStamp,
}

impl Entity for Permission {
    type Id = PermissionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn audit(&self) -> &AuditStamp {
        &self.audit
    }
}

impl Permission {
    pub fn from_draft(
        id: PermissionId,
        draft: PermissionDraft,
        now: DateTime<Utc>,
        actor: Option<UserId>,
    ) -> Self {
        Self {
            id,
            name: draft.name,
            description: draft.description,
            color: draft.color,
            audit: AuditStamp::new(now, actor),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDraft {
    pub name: String,
    pub description: String,
    pub color: String,
}

impl PermissionDraft {
    /// `color` may be omitted, and may be given with or without the leading `#`.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        color: Option<&str>,
    ) -> DomainResult<Self> {
        Ok(Self {
            name: validate_length("name", name.into(), 2, 30)?,
            description: validate_length("description", description.into(), 2, 120)?,
            color: normalize_color(color)?,
        })
    }
}

fn normalize_color(color: Option<&str>) -> DomainResult<String> {
    let Some(raw) = color.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(DEFAULT_COLOR.to_string());
    };
    let hex = raw.strip_prefix('#').unwrap_or(raw);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DomainError::validation(format!(
            "color must be a 6-digit hex value, got '{raw}'"
        )));
    }
    Ok(format!("#{}", hex.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_defaults_and_normalizes() {
        let d = PermissionDraft::new("write", "Write content", None).unwrap();
        assert_eq!(d.color, DEFAULT_COLOR);

        let d = PermissionDraft::new("write", "Write content", Some("8AC926")).unwrap();
        assert_eq!(d.color, "#8ac926");

        assert!(PermissionDraft::new("write", "Write content", Some("#12345")).is_err());
        assert!(PermissionDraft::new("write", "Write content", Some("#zzzzzz")).is_err());
    }

    #[test]
    fn name_length_is_enforced() {
        assert!(PermissionDraft::new("w", "Write content", None).is_err());
        assert!(PermissionDraft::new("w".repeat(31), "Write content", None).is_err());
    }
}
