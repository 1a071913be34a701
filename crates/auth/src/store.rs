//! Persistence seams for users, roles and permissions.
//!
//! Adapters live in `rolegate-infra` (in-memory and Postgres). Every method is
//! a single atomic store operation; services never hold a store-level lock
//! across two calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use rolegate_core::{PermissionId, RoleId, UserId};

use crate::error::StoreError;
use crate::permissions::{Permission, PermissionDraft};
use crate::roles::{Role, RoleDraft};
use crate::user::{NewUser, User};

pub type StoreResult<T> = Result<T, StoreError>;

/// In-place mutation applied by `UserStore::update_user_with`.
pub type UserMutation<'a> = &'a mut (dyn FnMut(&mut User) + Send);

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `UniqueViolation` on a taken username or email.
    async fn insert_user(
        &self,
        new: NewUser,
        now: DateTime<Utc>,
        actor: Option<UserId>,
    ) -> StoreResult<User>;

    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn list_users(&self) -> StoreResult<Vec<User>>;

    /// Atomic read-modify-write of one user row.
    ///
    /// The mutation runs exactly once while the row is locked against other
    /// writers; the stored result is returned. `NotFound` if the row is gone.
    async fn update_user_with(&self, id: UserId, mutate: UserMutation<'_>) -> StoreResult<User>;

    /// Removes the user and its role assignments. Returns `false` if absent.
    async fn delete_user(&self, id: UserId) -> StoreResult<bool>;

    async fn user_roles(&self, id: UserId) -> StoreResult<Vec<Role>>;

    /// Returns `false` if the assignment already existed. `NotFound` if either
    /// side does not exist.
    async fn add_user_role(&self, user: UserId, role: RoleId) -> StoreResult<bool>;

    /// Returns `false` if there was nothing to remove.
    async fn remove_user_role(&self, user: UserId, role: RoleId) -> StoreResult<bool>;

    async fn users_with_role(&self, role: RoleId) -> StoreResult<Vec<User>>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Insert the role linked to `permissions` as one write.
    ///
    /// Fails with `UniqueViolation` on a taken name and `NotFound` on an
    /// unknown permission; nothing is written in either case.
    async fn insert_role(
        &self,
        draft: RoleDraft,
        permissions: &[PermissionId],
        now: DateTime<Utc>,
        actor: Option<UserId>,
    ) -> StoreResult<Role>;

    /// Insert with a caller-chosen id (reserved seed rows).
    async fn insert_role_with_id(
        &self,
        id: RoleId,
        draft: RoleDraft,
        now: DateTime<Utc>,
        actor: Option<UserId>,
    ) -> StoreResult<Role>;

    async fn role_by_id(&self, id: RoleId) -> StoreResult<Option<Role>>;

    async fn role_by_name(&self, name: &str) -> StoreResult<Option<Role>>;

    async fn list_roles(&self) -> StoreResult<Vec<Role>>;

    /// Overwrite name, description and audit stamp of an existing role and,
    /// when `permissions` is `Some`, replace its links. All or nothing.
    async fn update_role(
        &self,
        role: &Role,
        permissions: Option<&[PermissionId]>,
    ) -> StoreResult<Role>;

    /// Removes the role and its join rows. Returns `false` if absent.
    async fn delete_role(&self, id: RoleId) -> StoreResult<bool>;

    async fn role_permissions(&self, id: RoleId) -> StoreResult<Vec<Permission>>;

    /// Replace the permission set linked to a role. `NotFound` if the role
    /// or any permission does not exist; nothing is changed in that case.
    async fn set_role_permissions(&self, id: RoleId, permissions: &[PermissionId])
    -> StoreResult<()>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn insert_permission(
        &self,
        draft: PermissionDraft,
        now: DateTime<Utc>,
        actor: Option<UserId>,
    ) -> StoreResult<Permission>;

    async fn permission_by_id(&self, id: PermissionId) -> StoreResult<Option<Permission>>;

    async fn permission_by_name(&self, name: &str) -> StoreResult<Option<Permission>>;

    async fn list_permissions(&self) -> StoreResult<Vec<Permission>>;

    async fn update_permission(&self, permission: &Permission) -> StoreResult<Permission>;

    /// Removes the permission and its role links. Returns `false` if absent.
    async fn delete_permission(&self, id: PermissionId) -> StoreResult<bool>;
}

/// A backend implementing all three stores.
pub trait RbacStore: UserStore + RoleStore + PermissionStore {}

impl<T> RbacStore for T where T: UserStore + RoleStore + PermissionStore {}
