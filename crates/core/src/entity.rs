//! Entity trait: identity + continuity across state changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Creation/modification bookkeeping.
    fn audit(&self) -> &AuditStamp;
}

/// Who created/last changed a row, and when.
///
/// `created_by`/`updated_by` are optional: seed data and self-service
/// registration have no acting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStamp {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<UserId>,
    pub updated_by: Option<UserId>,
}

impl AuditStamp {
    pub fn new(now: DateTime<Utc>, actor: Option<UserId>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            created_by: actor,
            updated_by: actor,
        }
    }

    /// Refresh the modification stamp. Called on every mutating operation.
    pub fn touch(&mut self, now: DateTime<Utc>, actor: Option<UserId>) {
        self.updated_at = now;
        self.updated_by = actor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn touch_keeps_creation_fields() {
        let t0 = Utc::now();
        let mut stamp = AuditStamp::new(t0, Some(UserId::new(1)));
        stamp.touch(t0 + Duration::seconds(5), Some(UserId::new(2)));

        assert_eq!(stamp.created_at, t0);
        assert_eq!(stamp.created_by, Some(UserId::new(1)));
        assert_eq!(stamp.updated_at, t0 + Duration::seconds(5));
        assert_eq!(stamp.updated_by, Some(UserId::new(2)));
    }
}
