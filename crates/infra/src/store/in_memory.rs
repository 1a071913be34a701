use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use rolegate_auth::{
    NewUser, Permission, PermissionDraft, PermissionStore, Role, RoleDraft, RoleStore,
    StoreError, StoreResult, User, UserMutation, UserStore,
};
use rolegate_core::{Entity, PermissionId, RoleId, UserId};

/// Write `row` under its own id and return it.
fn put<E>(table: &mut BTreeMap<E::Id, E>, row: E) -> E
where
    E: Entity + Clone,
    E::Id: Ord,
{
    table.insert(row.id().clone(), row.clone());
    row
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    roles: BTreeMap<RoleId, Role>,
    permissions: BTreeMap<PermissionId, Permission>,
    user_role: BTreeSet<(UserId, RoleId)>,
    role_permission: BTreeSet<(RoleId, PermissionId)>,
    last_user_id: i64,
    last_role_id: i64,
    last_permission_id: i64,
}

impl Tables {
    fn role_name_taken(&self, name: &str, except: Option<RoleId>) -> bool {
        self.roles
            .values()
            .any(|r| r.name == name && Some(r.id) != except)
    }

    fn permission_name_taken(&self, name: &str, except: Option<PermissionId>) -> bool {
        self.permissions
            .values()
            .any(|p| p.name == name && Some(p.id) != except)
    }

    fn ensure_permissions(&self, permissions: &[PermissionId]) -> StoreResult<()> {
        if permissions.iter().any(|p| !self.permissions.contains_key(p)) {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Callers check the role and permissions exist first.
    fn replace_links(&mut self, id: RoleId, permissions: &[PermissionId]) {
        self.role_permission.retain(|(role, _)| *role != id);
        for p in permissions {
            self.role_permission.insert((id, *p));
        }
    }
}

/// In-memory users/roles/permissions store.
///
/// Intended for tests/dev. All tables sit behind one lock, so every trait
/// method is atomic with respect to every other.
#[derive(Debug, Default)]
pub struct InMemoryRbacStore {
    tables: RwLock<Tables>,
}

impl InMemoryRbacStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }
}

#[async_trait]
impl UserStore for InMemoryRbacStore {
    async fn insert_user(
        &self,
        new: NewUser,
        now: DateTime<Utc>,
        actor: Option<UserId>,
    ) -> StoreResult<User> {
        let mut t = self.write()?;
        if t.users.values().any(|u| u.username == new.username) {
            return Err(StoreError::unique("username", new.username));
        }
        if t.users.values().any(|u| u.email == new.email) {
            return Err(StoreError::unique("email", new.email));
        }
        t.last_user_id += 1;
        let user = User::from_new(UserId::new(t.last_user_id), new, now, actor);
        Ok(put(&mut t.users, user))
    }

    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.read()?.users.values().cloned().collect())
    }

    async fn update_user_with(&self, id: UserId, mutate: UserMutation<'_>) -> StoreResult<User> {
        let mut t = self.write()?;
        let user = t.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        mutate(user);
        Ok(user.clone())
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<bool> {
        let mut t = self.write()?;
        if t.users.remove(&id).is_none() {
            return Ok(false);
        }
        t.user_role.retain(|(user, _)| *user != id);
        Ok(true)
    }

    async fn user_roles(&self, id: UserId) -> StoreResult<Vec<Role>> {
        let t = self.read()?;
        Ok(t.user_role
            .iter()
            .filter(|(user, _)| *user == id)
            .filter_map(|(_, role)| t.roles.get(role).cloned())
            .collect())
    }

    async fn add_user_role(&self, user: UserId, role: RoleId) -> StoreResult<bool> {
        let mut t = self.write()?;
        if !t.users.contains_key(&user) || !t.roles.contains_key(&role) {
            return Err(StoreError::NotFound);
        }
        Ok(t.user_role.insert((user, role)))
    }

    async fn remove_user_role(&self, user: UserId, role: RoleId) -> StoreResult<bool> {
        Ok(self.write()?.user_role.remove(&(user, role)))
    }

    async fn users_with_role(&self, role: RoleId) -> StoreResult<Vec<User>> {
        let t = self.read()?;
        Ok(t.user_role
            .iter()
            .filter(|(_, r)| *r == role)
            .filter_map(|(user, _)| t.users.get(user).cloned())
            .collect())
    }
}

#[async_trait]
impl RoleStore for InMemoryRbacStore {
    async fn insert_role(
        &self,
        draft: RoleDraft,
        permissions: &[PermissionId],
        now: DateTime<Utc>,
        actor: Option<UserId>,
    ) -> StoreResult<Role> {
        let mut t = self.write()?;
        if t.role_name_taken(&draft.name, None) {
            return Err(StoreError::unique("name", draft.name));
        }
        t.ensure_permissions(permissions)?;
        t.last_role_id += 1;
        let role = Role::from_draft(RoleId::new(t.last_role_id), draft, now, actor);
        t.replace_links(role.id, permissions);
        Ok(put(&mut t.roles, role))
    }

    async fn insert_role_with_id(
        &self,
        id: RoleId,
        draft: RoleDraft,
        now: DateTime<Utc>,
        actor: Option<UserId>,
    ) -> StoreResult<Role> {
        let mut t = self.write()?;
        if t.roles.contains_key(&id) {
            return Err(StoreError::unique("id", id.to_string()));
        }
        if t.role_name_taken(&draft.name, None) {
            return Err(StoreError::unique("name", draft.name));
        }
        t.last_role_id = t.last_role_id.max(id.get());
        let role = Role::from_draft(id, draft, now, actor);
        Ok(put(&mut t.roles, role))
    }

    async fn role_by_id(&self, id: RoleId) -> StoreResult<Option<Role>> {
        Ok(self.read()?.roles.get(&id).cloned())
    }

    async fn role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        Ok(self.read()?.roles.values().find(|r| r.name == name).cloned())
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        Ok(self.read()?.roles.values().cloned().collect())
    }

    async fn update_role(
        &self,
        role: &Role,
        permissions: Option<&[PermissionId]>,
    ) -> StoreResult<Role> {
        let mut t = self.write()?;
        if !t.roles.contains_key(&role.id) {
            return Err(StoreError::NotFound);
        }
        if t.role_name_taken(&role.name, Some(role.id)) {
            return Err(StoreError::unique("name", role.name.clone()));
        }
        if let Some(permissions) = permissions {
            t.ensure_permissions(permissions)?;
            t.replace_links(role.id, permissions);
        }
        Ok(put(&mut t.roles, role.clone()))
    }

    async fn delete_role(&self, id: RoleId) -> StoreResult<bool> {
        let mut t = self.write()?;
        if t.roles.remove(&id).is_none() {
            return Ok(false);
        }
        t.user_role.retain(|(_, role)| *role != id);
        t.role_permission.retain(|(role, _)| *role != id);
        Ok(true)
    }

    async fn role_permissions(&self, id: RoleId) -> StoreResult<Vec<Permission>> {
        let t = self.read()?;
        Ok(t.role_permission
            .iter()
            .filter(|(role, _)| *role == id)
            .filter_map(|(_, p)| t.permissions.get(p).cloned())
            .collect())
    }

    async fn set_role_permissions(
        &self,
        id: RoleId,
        permissions: &[PermissionId],
    ) -> StoreResult<()> {
        let mut t = self.write()?;
        if !t.roles.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        t.ensure_permissions(permissions)?;
        t.replace_links(id, permissions);
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for InMemoryRbacStore {
    async fn insert_permission(
        &self,
        draft: PermissionDraft,
        now: DateTime<Utc>,
        actor: Option<UserId>,
    ) -> StoreResult<Permission> {
        let mut t = self.write()?;
        if t.permission_name_taken(&draft.name, None) {
            return Err(StoreError::unique("name", draft.name));
        }
        t.last_permission_id += 1;
        let permission =
            Permission::from_draft(PermissionId::new(t.last_permission_id), draft, now, actor);
        Ok(put(&mut t.permissions, permission))
    }

    async fn permission_by_id(&self, id: PermissionId) -> StoreResult<Option<Permission>> {
        Ok(self.read()?.permissions.get(&id).cloned())
    }

    async fn permission_by_name(&self, name: &str) -> StoreResult<Option<Permission>> {
        Ok(self
            .read()?
            .permissions
            .values()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn list_permissions(&self) -> StoreResult<Vec<Permission>> {
        Ok(self.read()?.permissions.values().cloned().collect())
    }

    async fn update_permission(&self, permission: &Permission) -> StoreResult<Permission> {
        let mut t = self.write()?;
        if !t.permissions.contains_key(&permission.id) {
            return Err(StoreError::NotFound);
        }
        if t.permission_name_taken(&permission.name, Some(permission.id)) {
            return Err(StoreError::unique("name", permission.name.clone()));
        }
        Ok(put(&mut t.permissions, permission.clone()))
    }

    async fn delete_permission(&self, id: PermissionId) -> StoreResult<bool> {
        let mut t = self.write()?;
        if t.permissions.remove(&id).is_none() {
            return Ok(false);
        }
        t.role_permission.retain(|(_, p)| *p != id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str) -> NewUser {
        NewUser::new(name, format!("{name}@example.com"), "hash").unwrap()
    }

    #[tokio::test]
    async fn ids_start_at_one_and_names_are_unique() {
        let store = InMemoryRbacStore::new();
        let now = Utc::now();

        let u = store.insert_user(new_user("alice"), now, None).await.unwrap();
        assert_eq!(u.id, UserId::new(1));

        let dup = store.insert_user(new_user("alice"), now, None).await;
        assert!(matches!(dup, Err(StoreError::UniqueViolation { .. })));

        let r = store
            .insert_role(RoleDraft::new("editor", "Editor").unwrap(), &[], now, None)
            .await
            .unwrap();
        assert_eq!(r.id, RoleId::new(1));
        // case-sensitive
        assert!(
            store
                .insert_role(RoleDraft::new("Editor", "Editor").unwrap(), &[], now, None)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn deleting_a_role_cascades_join_rows() {
        let store = InMemoryRbacStore::new();
        let now = Utc::now();
        let u = store.insert_user(new_user("bob"), now, None).await.unwrap();
        let p = store
            .insert_permission(PermissionDraft::new("write", "Write", None).unwrap(), now, None)
            .await
            .unwrap();
        let r = store
            .insert_role(RoleDraft::new("moderate", "Moderator").unwrap(), &[], now, None)
            .await
            .unwrap();
        store.set_role_permissions(r.id, &[p.id]).await.unwrap();
        assert!(store.add_user_role(u.id, r.id).await.unwrap());
        assert!(!store.add_user_role(u.id, r.id).await.unwrap());

        assert!(store.delete_role(r.id).await.unwrap());
        assert!(store.user_roles(u.id).await.unwrap().is_empty());
        assert!(store.role_permissions(r.id).await.unwrap().is_empty());
        assert!(!store.delete_role(r.id).await.unwrap());
    }

    #[tokio::test]
    async fn set_role_permissions_rejects_unknown_ids_atomically() {
        let store = InMemoryRbacStore::new();
        let now = Utc::now();
        let p = store
            .insert_permission(PermissionDraft::new("write", "Write", None).unwrap(), now, None)
            .await
            .unwrap();
        let r = store
            .insert_role(RoleDraft::new("moderate", "Moderator").unwrap(), &[], now, None)
            .await
            .unwrap();
        store.set_role_permissions(r.id, &[p.id]).await.unwrap();

        let err = store
            .set_role_permissions(r.id, &[PermissionId::new(99)])
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound);
        assert_eq!(store.role_permissions(r.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn role_writes_with_unknown_permission_leave_nothing_behind() {
        let store = InMemoryRbacStore::new();
        let now = Utc::now();
        let p = store
            .insert_permission(PermissionDraft::new("write", "Write", None).unwrap(), now, None)
            .await
            .unwrap();

        let err = store
            .insert_role(
                RoleDraft::new("ghost", "Ghost").unwrap(),
                &[p.id, PermissionId::new(99)],
                now,
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound);
        assert!(store.role_by_name("ghost").await.unwrap().is_none());

        let mut role = store
            .insert_role(RoleDraft::new("moderate", "Moderator").unwrap(), &[p.id], now, None)
            .await
            .unwrap();
        role.name = "renamed".into();
        let err = store
            .update_role(&role, Some(&[PermissionId::new(99)]))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound);
        assert!(store.role_by_name("renamed").await.unwrap().is_none());
        assert_eq!(store.role_by_id(role.id).await.unwrap().unwrap().name, "moderate");
        assert_eq!(store.role_permissions(role.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reserved_id_bumps_the_sequence() {
        let store = InMemoryRbacStore::new();
        let now = Utc::now();
        store
            .insert_role_with_id(RoleId::new(5), RoleDraft::new("five", "Fifth").unwrap(), now, None)
            .await
            .unwrap();
        let next = store
            .insert_role(RoleDraft::new("six", "Sixth").unwrap(), &[], now, None)
            .await
            .unwrap();
        assert_eq!(next.id, RoleId::new(6));
    }

    #[tokio::test]
    async fn update_user_with_missing_row_is_not_found() {
        let store = InMemoryRbacStore::new();
        let err = store
            .update_user_with(UserId::new(1), &mut |u: &mut User| u.confirmed = true)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound);
    }
}
