//! Authorization engine: memoized role and role→permission membership checks.

use std::sync::Arc;

use tracing::{debug, info, warn};

use rolegate_core::{Clock, RoleId, UserId};

use crate::cache::{AuthzCache, permission_key, role_key, user_prefix};
use crate::error::{AuthError, AuthResult};
use crate::roles::Role;
use crate::settings::AuthSettings;
use crate::store::RbacStore;
use crate::user::User;

/// What a request must satisfy to be allowed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// The user holds the named role.
    Role(String),
    /// The user holds `role` and `role` is linked to `permission`.
    RolePermission { role: String, permission: String },
}

impl Requirement {
    pub fn role(name: impl Into<String>) -> Self {
        Requirement::Role(name.into())
    }

    pub fn role_permission(role: impl Into<String>, permission: impl Into<String>) -> Self {
        Requirement::RolePermission {
            role: role.into(),
            permission: permission.into(),
        }
    }
}

impl core::fmt::Display for Requirement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Requirement::Role(role) => write!(f, "role '{role}'"),
            Requirement::RolePermission { role, permission } => {
                write!(f, "permission '{permission}' via role '{role}'")
            }
        }
    }
}

pub struct AuthorizationEngine {
    store: Arc<dyn RbacStore>,
    cache: Arc<dyn AuthzCache>,
    clock: Arc<dyn Clock>,
    settings: AuthSettings,
}

impl AuthorizationEngine {
    pub fn new(
        store: Arc<dyn RbacStore>,
        cache: Arc<dyn AuthzCache>,
        clock: Arc<dyn Clock>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            store,
            cache,
            clock,
            settings,
        }
    }

    pub async fn has_role(&self, user: UserId, role_name: &str) -> AuthResult<bool> {
        let key = role_key(user, role_name);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let epoch = self.cache.epoch();
        let held = self
            .store
            .user_roles(user)
            .await?
            .iter()
            .any(|role| role.name == role_name);
        self.cache.set(&key, held, epoch);
        Ok(held)
    }

    pub async fn has_role_permission(
        &self,
        user: UserId,
        role_name: &str,
        permission_name: &str,
    ) -> AuthResult<bool> {
        let key = permission_key(user, role_name, permission_name);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let epoch = self.cache.epoch();
        let role = self
            .store
            .user_roles(user)
            .await?
            .into_iter()
            .find(|role| role.name == role_name);
        let granted = match role {
            Some(role) => self
                .store
                .role_permissions(role.id)
                .await?
                .iter()
                .any(|p| p.name == permission_name),
            None => false,
        };
        self.cache.set(&key, granted, epoch);
        Ok(granted)
    }

    /// `Ok(())` if the user satisfies `requirement`, `Unauthorized` otherwise.
    pub async fn authorize(&self, user: UserId, requirement: &Requirement) -> AuthResult<()> {
        let allowed = match requirement {
            Requirement::Role(role) => self.has_role(user, role).await?,
            Requirement::RolePermission { role, permission } => {
                self.has_role_permission(user, role, permission).await?
            }
        };
        if allowed {
            Ok(())
        } else {
            debug!(user_id = %user, requirement = %requirement, "authorization denied");
            Err(AuthError::unauthorized())
        }
    }

    pub async fn user_roles(&self, user: UserId) -> AuthResult<Vec<Role>> {
        Ok(self.store.user_roles(user).await?)
    }

    /// Assign `role` to `user`. Returns `false` if it was already assigned.
    pub async fn add_role(
        &self,
        user: UserId,
        role: RoleId,
        actor: Option<UserId>,
    ) -> AuthResult<bool> {
        if self.store.role_by_id(role).await?.is_none() {
            return Err(AuthError::not_found());
        }
        let added = self.store.add_user_role(user, role).await?;
        if added {
            self.touch_user(user, actor).await?;
            self.invalidate_user(user);
            info!(user_id = %user, role_id = %role, "role assigned");
        }
        Ok(added)
    }

    /// Unassign `role` from `user`. Returns `false` if it was not assigned.
    pub async fn remove_role(
        &self,
        user: UserId,
        role: RoleId,
        actor: Option<UserId>,
    ) -> AuthResult<bool> {
        if self.store.role_by_id(role).await?.is_none() {
            return Err(AuthError::not_found());
        }
        if self.store.user_by_id(user).await?.is_none() {
            return Err(AuthError::not_found());
        }
        let removed = self.store.remove_user_role(user, role).await?;
        if removed {
            self.touch_user(user, actor).await?;
            self.invalidate_user(user);
            info!(user_id = %user, role_id = %role, "role removed");
        }
        Ok(removed)
    }

    /// Grant the admin role if the user's email is a configured admin address.
    ///
    /// Returns `true` only when the role was newly granted.
    pub async fn ensure_admin_role(&self, user: &User) -> AuthResult<bool> {
        if !self.settings.is_admin_email(&user.email) {
            return Ok(false);
        }
        if self.store.role_by_id(RoleId::ADMIN).await?.is_none() {
            warn!(user_id = %user.id, "admin address signed in but the admin role is not seeded");
            return Ok(false);
        }
        self.add_role(user.id, RoleId::ADMIN, None).await
    }

    pub fn invalidate_user(&self, user: UserId) {
        self.cache.invalidate_prefix(&user_prefix(user));
    }

    /// Drop every memoized answer. Used after registry changes.
    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    async fn touch_user(&self, user: UserId, actor: Option<UserId>) -> AuthResult<()> {
        let now = self.clock.now();
        self.store
            .update_user_with(user, &mut |u: &mut User| u.audit.touch(now, actor))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirement_display() {
        assert_eq!(Requirement::role("admin").to_string(), "role 'admin'");
        assert_eq!(
            Requirement::role_permission("moderate", "write").to_string(),
            "permission 'write' via role 'moderate'"
        );
    }
}
