//! Role/permission registry: CRUD with name uniqueness and default seed data.
//!
//! Every change that can alter an authorization answer (renames, link changes,
//! deletions) flushes the whole authorization cache.

use std::sync::Arc;

use tracing::info;

use rolegate_core::{Clock, DomainError, PermissionId, RoleId, UserId};

use crate::authorize::AuthorizationEngine;
use crate::error::{AuthError, AuthResult};
use crate::permissions::{Permission, PermissionDraft};
use crate::roles::{ADMIN_ROLE, DEFAULT_USER_ROLE, Role, RoleDraft};
use crate::store::RbacStore;
use crate::user::User;

/// Default permissions: (name, description, color).
const SEED_PERMISSIONS: &[(&str, &str, &str)] = &[
    ("write", "Write permission", "#8ac926"),
    ("update", "Update permission", "#1982c4"),
    ("delete", "Delete permission", "#ff595e"),
];

/// Default roles after `admin`: (name, description).
const SEED_ROLES: &[(&str, &str)] = &[
    ("moderate", "Moderator role"),
    (DEFAULT_USER_ROLE, "Users role"),
];

/// A role together with the permissions linked to it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RoleDetails {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<Permission>,
}

pub struct RbacRegistry {
    store: Arc<dyn RbacStore>,
    authz: Arc<AuthorizationEngine>,
    clock: Arc<dyn Clock>,
}

impl RbacRegistry {
    pub fn new(
        store: Arc<dyn RbacStore>,
        authz: Arc<AuthorizationEngine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, authz, clock }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Roles
    // ─────────────────────────────────────────────────────────────────────

    pub async fn create_role(
        &self,
        name: &str,
        description: &str,
        permission_ids: &[PermissionId],
        actor: Option<UserId>,
    ) -> AuthResult<RoleDetails> {
        let draft = RoleDraft::new(name, description)?;
        if self.store.role_by_name(&draft.name).await?.is_some() {
            return Err(DomainError::duplicate_name(draft.name).into());
        }
        self.ensure_permissions_exist(permission_ids).await?;

        let role = self
            .store
            .insert_role(draft, permission_ids, self.clock.now(), actor)
            .await?;
        info!(role_id = %role.id, name = %role.name, "role created");
        self.role_details(role).await
    }

    /// `permission_ids: None` leaves the role's links untouched.
    pub async fn update_role(
        &self,
        id: RoleId,
        name: &str,
        description: &str,
        permission_ids: Option<&[PermissionId]>,
        actor: Option<UserId>,
    ) -> AuthResult<RoleDetails> {
        let mut role = self.get_role(id).await?;
        let draft = RoleDraft::new(name, description)?;
        if let Some(other) = self.store.role_by_name(&draft.name).await? {
            if other.id != id {
                return Err(DomainError::duplicate_name(draft.name).into());
            }
        }
        if let Some(ids) = permission_ids {
            self.ensure_permissions_exist(ids).await?;
        }

        role.name = draft.name;
        role.description = draft.description;
        role.audit.touch(self.clock.now(), actor);
        // name and links land together or not at all
        let role = self.store.update_role(&role, permission_ids).await?;
        self.authz.invalidate_all();
        info!(role_id = %id, name = %role.name, "role updated");
        self.role_details(role).await
    }

    pub async fn delete_role(&self, id: RoleId) -> AuthResult<()> {
        if id == RoleId::ADMIN {
            return Err(DomainError::conflict("the admin role cannot be deleted").into());
        }
        if !self.store.delete_role(id).await? {
            return Err(AuthError::not_found());
        }
        self.authz.invalidate_all();
        info!(role_id = %id, "role deleted");
        Ok(())
    }

    pub async fn get_role(&self, id: RoleId) -> AuthResult<Role> {
        self.store
            .role_by_id(id)
            .await?
            .ok_or_else(AuthError::not_found)
    }

    pub async fn get_role_details(&self, id: RoleId) -> AuthResult<RoleDetails> {
        let role = self.get_role(id).await?;
        self.role_details(role).await
    }

    pub async fn list_roles(&self) -> AuthResult<Vec<Role>> {
        Ok(self.store.list_roles().await?)
    }

    pub async fn role_permissions(&self, id: RoleId) -> AuthResult<Vec<Permission>> {
        self.get_role(id).await?;
        Ok(self.store.role_permissions(id).await?)
    }

    pub async fn users_with_role(&self, id: RoleId) -> AuthResult<Vec<User>> {
        self.get_role(id).await?;
        Ok(self.store.users_with_role(id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Permissions
    // ─────────────────────────────────────────────────────────────────────

    pub async fn create_permission(
        &self,
        name: &str,
        description: &str,
        color: Option<&str>,
        actor: Option<UserId>,
    ) -> AuthResult<Permission> {
        let draft = PermissionDraft::new(name, description, color)?;
        if self.store.permission_by_name(&draft.name).await?.is_some() {
            return Err(DomainError::duplicate_name(draft.name).into());
        }
        let permission = self
            .store
            .insert_permission(draft, self.clock.now(), actor)
            .await?;
        info!(permission_id = %permission.id, name = %permission.name, "permission created");
        Ok(permission)
    }

    pub async fn update_permission(
        &self,
        id: PermissionId,
        name: &str,
        description: &str,
        color: Option<&str>,
        actor: Option<UserId>,
    ) -> AuthResult<Permission> {
        let mut permission = self.get_permission(id).await?;
        let draft = PermissionDraft::new(name, description, color)?;
        if let Some(other) = self.store.permission_by_name(&draft.name).await? {
            if other.id != id {
                return Err(DomainError::duplicate_name(draft.name).into());
            }
        }

        permission.name = draft.name;
        permission.description = draft.description;
        permission.color = draft.color;
        permission.audit.touch(self.clock.now(), actor);
        let permission = self.store.update_permission(&permission).await?;
        self.authz.invalidate_all();
        info!(permission_id = %id, name = %permission.name, "permission updated");
        Ok(permission)
    }

    pub async fn delete_permission(&self, id: PermissionId) -> AuthResult<()> {
        if !self.store.delete_permission(id).await? {
            return Err(AuthError::not_found());
        }
        self.authz.invalidate_all();
        info!(permission_id = %id, "permission deleted");
        Ok(())
    }

    pub async fn get_permission(&self, id: PermissionId) -> AuthResult<Permission> {
        self.store
            .permission_by_id(id)
            .await?
            .ok_or_else(AuthError::not_found)
    }

    pub async fn list_permissions(&self) -> AuthResult<Vec<Permission>> {
        Ok(self.store.list_permissions().await?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Seed data
    // ─────────────────────────────────────────────────────────────────────

    /// Insert default roles and permissions into an empty registry.
    ///
    /// Returns `false` (and changes nothing) if any role or permission exists.
    pub async fn seed_defaults(&self) -> AuthResult<bool> {
        if !self.store.list_roles().await?.is_empty()
            || !self.store.list_permissions().await?.is_empty()
        {
            return Ok(false);
        }

        let now = self.clock.now();
        let mut permission_ids = Vec::with_capacity(SEED_PERMISSIONS.len());
        for (name, description, color) in SEED_PERMISSIONS {
            let draft = PermissionDraft::new(*name, *description, Some(*color))?;
            let permission = self.store.insert_permission(draft, now, None).await?;
            permission_ids.push(permission.id);
        }

        let admin = RoleDraft::new(ADMIN_ROLE, "Admin role")?;
        let admin = self
            .store
            .insert_role_with_id(RoleId::ADMIN, admin, now, None)
            .await?;
        self.store.set_role_permissions(admin.id, &permission_ids).await?;

        for (name, description) in SEED_ROLES {
            let draft = RoleDraft::new(*name, *description)?;
            self.store.insert_role(draft, &[], now, None).await?;
        }

        info!(
            roles = SEED_ROLES.len() + 1,
            permissions = SEED_PERMISSIONS.len(),
            "default roles and permissions seeded"
        );
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────

    async fn ensure_permissions_exist(&self, ids: &[PermissionId]) -> AuthResult<()> {
        for id in ids {
            if self.store.permission_by_id(*id).await?.is_none() {
                return Err(AuthError::not_found());
            }
        }
        Ok(())
    }

    async fn role_details(&self, role: Role) -> AuthResult<RoleDetails> {
        let permissions = self.store.role_permissions(role.id).await?;
        Ok(RoleDetails { role, permissions })
    }
}
