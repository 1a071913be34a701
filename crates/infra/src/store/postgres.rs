//! Postgres-backed users/roles/permissions store.
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | StoreError |
//! |------------|-----------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` (field taken from the constraint name) |
//! | Database (foreign key violation) | `23503` | `NotFound` (a referenced row does not exist) |
//! | RowNotFound | N/A | `NotFound` |
//! | anything else | any | `Backend` |
//!
//! Read-modify-write on a user row (`update_user_with`) runs inside a
//! transaction holding `SELECT … FOR UPDATE` on that row. Role writes that
//! also relink permissions share one transaction with the link rewrite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgConnection, PgPool, Row};
use tracing::instrument;

use rolegate_auth::{
    NewUser, Permission, PermissionDraft, PermissionStore, Role, RoleDraft, RoleStore,
    StoreError, StoreResult, User, UserMutation, UserStore,
};
use rolegate_core::{AuditStamp, PermissionId, RoleId, UserId};

/// Schema applied by `PostgresRbacStore::migrate`.
pub const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const USER_COLUMNS: &str = "id, username, email, password_hash, confirmed, blocked, \
     login_attempts, last_login_attempt, block_time, locale, timezone, last_seen, \
     created_at, updated_at, created_by, updated_by";

const ROLE_COLUMNS: &str = "id, name, description, created_at, updated_at, created_by, updated_by";

const PERMISSION_COLUMNS: &str =
    "id, name, description, color, created_at, updated_at, created_by, updated_by";

#[derive(Debug, Clone)]
pub struct PostgresRbacStore {
    pool: PgPool,
}

impl PostgresRbacStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e, &[]))?;
        Ok(Self::new(pool))
    }

    /// Create tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e, &[]))?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PostgresRbacStore {
    #[instrument(skip(self, new, now), fields(username = %new.username), err)]
    async fn insert_user(
        &self,
        new: NewUser,
        now: DateTime<Utc>,
        actor: Option<UserId>,
    ) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, confirmed, locale, timezone, \
             last_seen, created_at, updated_at, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $7, $8, $8) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&new.username)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(new.confirmed)
            .bind(&new.locale)
            .bind(&new.timezone)
            .bind(now)
            .bind(actor.map(UserId::get))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                map_sqlx_error(
                    "insert_user",
                    e,
                    &[("username", new.username.as_str()), ("email", new.email.as_str())],
                )
            })?;
        Ok(row.0)
    }

    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("user_by_id", e, &[]))?;
        Ok(row.map(|r| r.0))
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("user_by_email", e, &[]))?;
        Ok(row.map(|r| r.0))
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("user_by_username", e, &[]))?;
        Ok(row.map(|r| r.0))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e, &[]))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    #[instrument(skip(self, mutate), fields(user_id = %id), err)]
    async fn update_user_with(&self, id: UserId, mutate: UserMutation<'_>) -> StoreResult<User> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e, &[]))?;

        let select = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        let mut user = sqlx::query_as::<_, UserRow>(&select)
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_user", e, &[]))?
            .ok_or(StoreError::NotFound)?
            .0;

        mutate(&mut user);

        let update = format!(
            "UPDATE users SET username = $2, email = $3, password_hash = $4, confirmed = $5, \
             blocked = $6, login_attempts = $7, last_login_attempt = $8, block_time = $9, \
             locale = $10, timezone = $11, last_seen = $12, updated_at = $13, updated_by = $14 \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let login_attempts = i32::try_from(user.login_attempts).unwrap_or(i32::MAX);
        let row = sqlx::query_as::<_, UserRow>(&update)
            .bind(id.get())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.confirmed)
            .bind(user.blocked)
            .bind(login_attempts)
            .bind(user.last_login_attempt)
            .bind(user.block_time)
            .bind(&user.locale)
            .bind(&user.timezone)
            .bind(user.last_seen)
            .bind(user.audit.updated_at)
            .bind(user.audit.updated_by.map(UserId::get))
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                map_sqlx_error(
                    "update_user",
                    e,
                    &[("username", user.username.as_str()), ("email", user.email.as_str())],
                )
            })?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e, &[]))?;
        Ok(row.0)
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e, &[]))?;
        Ok(result.rows_affected() > 0)
    }

    async fn user_roles(&self, id: UserId) -> StoreResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            "SELECT r.id, r.name, r.description, r.created_at, r.updated_at, r.created_by, r.updated_by \
             FROM roles r JOIN user_role ur ON ur.role_id = r.id \
             WHERE ur.user_id = $1 ORDER BY r.id",
        )
        .bind(id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("user_roles", e, &[]))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn add_user_role(&self, user: UserId, role: RoleId) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO user_role (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user.get())
        .bind(role.get())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("add_user_role", e, &[]))?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove_user_role(&self, user: UserId, role: RoleId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM user_role WHERE user_id = $1 AND role_id = $2")
            .bind(user.get())
            .bind(role.get())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_user_role", e, &[]))?;
        Ok(result.rows_affected() > 0)
    }

    async fn users_with_role(&self, role: RoleId) -> StoreResult<Vec<User>> {
        let sql = format!(
            "SELECT {cols} FROM users u JOIN user_role ur ON ur.user_id = u.id \
             WHERE ur.role_id = $1 ORDER BY u.id",
            cols = prefixed("u", USER_COLUMNS)
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(role.get())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("users_with_role", e, &[]))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}

#[async_trait]
impl RoleStore for PostgresRbacStore {
    #[instrument(skip(self, draft, permissions, now), fields(name = %draft.name), err)]
    async fn insert_role(
        &self,
        draft: RoleDraft,
        permissions: &[PermissionId],
        now: DateTime<Utc>,
        actor: Option<UserId>,
    ) -> StoreResult<Role> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e, &[]))?;

        let sql = format!(
            "INSERT INTO roles (name, description, created_at, updated_at, created_by, updated_by) \
             VALUES ($1, $2, $3, $3, $4, $4) RETURNING {ROLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RoleRow>(&sql)
            .bind(&draft.name)
            .bind(&draft.description)
            .bind(now)
            .bind(actor.map(UserId::get))
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_role", e, &[("name", draft.name.as_str())]))?;

        replace_role_links(&mut *tx, row.0.id, permissions).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e, &[]))?;
        Ok(row.0)
    }

    #[instrument(skip(self, draft, now), fields(role_id = %id, name = %draft.name), err)]
    async fn insert_role_with_id(
        &self,
        id: RoleId,
        draft: RoleDraft,
        now: DateTime<Utc>,
        actor: Option<UserId>,
    ) -> StoreResult<Role> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e, &[]))?;

        let sql = format!(
            "INSERT INTO roles (id, name, description, created_at, updated_at, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $4, $5, $5) RETURNING {ROLE_COLUMNS}"
        );
        let id_text = id.to_string();
        let row = sqlx::query_as::<_, RoleRow>(&sql)
            .bind(id.get())
            .bind(&draft.name)
            .bind(&draft.description)
            .bind(now)
            .bind(actor.map(UserId::get))
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                map_sqlx_error(
                    "insert_role_with_id",
                    e,
                    &[("name", draft.name.as_str()), ("pkey", id_text.as_str())],
                )
            })?;

        // keep BIGSERIAL ahead of explicitly chosen ids
        sqlx::query("SELECT setval(pg_get_serial_sequence('roles', 'id'), (SELECT MAX(id) FROM roles))")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("bump_role_sequence", e, &[]))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e, &[]))?;
        Ok(row.0)
    }

    async fn role_by_id(&self, id: RoleId) -> StoreResult<Option<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1");
        let row = sqlx::query_as::<_, RoleRow>(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("role_by_id", e, &[]))?;
        Ok(row.map(|r| r.0))
    }

    async fn role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = $1");
        let row = sqlx::query_as::<_, RoleRow>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("role_by_name", e, &[]))?;
        Ok(row.map(|r| r.0))
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY id");
        let rows = sqlx::query_as::<_, RoleRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_roles", e, &[]))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    #[instrument(skip(self, role, permissions), fields(role_id = %role.id), err)]
    async fn update_role(
        &self,
        role: &Role,
        permissions: Option<&[PermissionId]>,
    ) -> StoreResult<Role> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e, &[]))?;

        let sql = format!(
            "UPDATE roles SET name = $2, description = $3, updated_at = $4, updated_by = $5 \
             WHERE id = $1 RETURNING {ROLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RoleRow>(&sql)
            .bind(role.id.get())
            .bind(&role.name)
            .bind(&role.description)
            .bind(role.audit.updated_at)
            .bind(role.audit.updated_by.map(UserId::get))
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_role", e, &[("name", role.name.as_str())]))?
            .ok_or(StoreError::NotFound)?;

        if let Some(permissions) = permissions {
            replace_role_links(&mut *tx, role.id, permissions).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e, &[]))?;
        Ok(row.0)
    }

    async fn delete_role(&self, id: RoleId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_role", e, &[]))?;
        Ok(result.rows_affected() > 0)
    }

    async fn role_permissions(&self, id: RoleId) -> StoreResult<Vec<Permission>> {
        let sql = format!(
            "SELECT {cols} FROM permissions p JOIN role_permission rp ON rp.permission_id = p.id \
             WHERE rp.role_id = $1 ORDER BY p.id",
            cols = prefixed("p", PERMISSION_COLUMNS)
        );
        let rows = sqlx::query_as::<_, PermissionRow>(&sql)
            .bind(id.get())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("role_permissions", e, &[]))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    #[instrument(skip(self, permissions), fields(role_id = %id, count = permissions.len()), err)]
    async fn set_role_permissions(
        &self,
        id: RoleId,
        permissions: &[PermissionId],
    ) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e, &[]))?;

        let role_exists = sqlx::query("SELECT id FROM roles WHERE id = $1 FOR UPDATE")
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_role", e, &[]))?
            .is_some();
        if !role_exists {
            return Err(StoreError::NotFound);
        }

        replace_role_links(&mut *tx, id, permissions).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e, &[]))?;
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for PostgresRbacStore {
    #[instrument(skip(self, draft, now), fields(name = %draft.name), err)]
    async fn insert_permission(
        &self,
        draft: PermissionDraft,
        now: DateTime<Utc>,
        actor: Option<UserId>,
    ) -> StoreResult<Permission> {
        let sql = format!(
            "INSERT INTO permissions (name, description, color, created_at, updated_at, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $4, $5, $5) RETURNING {PERMISSION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PermissionRow>(&sql)
            .bind(&draft.name)
            .bind(&draft.description)
            .bind(&draft.color)
            .bind(now)
            .bind(actor.map(UserId::get))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_permission", e, &[("name", draft.name.as_str())]))?;
        Ok(row.0)
    }

    async fn permission_by_id(&self, id: PermissionId) -> StoreResult<Option<Permission>> {
        let sql = format!("SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = $1");
        let row = sqlx::query_as::<_, PermissionRow>(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("permission_by_id", e, &[]))?;
        Ok(row.map(|r| r.0))
    }

    async fn permission_by_name(&self, name: &str) -> StoreResult<Option<Permission>> {
        let sql = format!("SELECT {PERMISSION_COLUMNS} FROM permissions WHERE name = $1");
        let row = sqlx::query_as::<_, PermissionRow>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("permission_by_name", e, &[]))?;
        Ok(row.map(|r| r.0))
    }

    async fn list_permissions(&self) -> StoreResult<Vec<Permission>> {
        let sql = format!("SELECT {PERMISSION_COLUMNS} FROM permissions ORDER BY id");
        let rows = sqlx::query_as::<_, PermissionRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_permissions", e, &[]))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn update_permission(&self, permission: &Permission) -> StoreResult<Permission> {
        let sql = format!(
            "UPDATE permissions SET name = $2, description = $3, color = $4, updated_at = $5, \
             updated_by = $6 WHERE id = $1 RETURNING {PERMISSION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PermissionRow>(&sql)
            .bind(permission.id.get())
            .bind(&permission.name)
            .bind(&permission.description)
            .bind(&permission.color)
            .bind(permission.audit.updated_at)
            .bind(permission.audit.updated_by.map(UserId::get))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_permission", e, &[("name", permission.name.as_str())]))?
            .ok_or(StoreError::NotFound)?;
        Ok(row.0)
    }

    async fn delete_permission(&self, id: PermissionId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_permission", e, &[]))?;
        Ok(result.rows_affected() > 0)
    }
}

/// Qualify every column in a comma-separated list with a table alias.
/// Replace every permission link of `role` inside the caller's transaction.
///
/// `NotFound` when any id does not name a permission.
async fn replace_role_links(
    conn: &mut PgConnection,
    role: RoleId,
    permissions: &[PermissionId],
) -> StoreResult<()> {
    let mut ids: Vec<i64> = permissions.iter().map(|p| p.get()).collect();
    ids.sort_unstable();
    ids.dedup();

    let found: i64 = sqlx::query("SELECT COUNT(*) AS n FROM permissions WHERE id = ANY($1)")
        .bind(&ids)
        .fetch_one(&mut *conn)
        .await
        .and_then(|row| row.try_get("n"))
        .map_err(|e| map_sqlx_error("count_permissions", e, &[]))?;
    if found != ids.len() as i64 {
        return Err(StoreError::NotFound);
    }

    sqlx::query("DELETE FROM role_permission WHERE role_id = $1")
        .bind(role.get())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("clear_role_permissions", e, &[]))?;

    sqlx::query(
        "INSERT INTO role_permission (role_id, permission_id) \
         SELECT $1, unnest($2::bigint[]) ON CONFLICT DO NOTHING",
    )
    .bind(role.get())
    .bind(&ids)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("insert_role_permissions", e, &[]))?;
    Ok(())
}

fn prefixed(alias: &str, columns: &str) -> String {
    columns
        .split(',')
        .map(|c| format!("{alias}.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Map SQLx errors to `StoreError`.
///
/// `values` pairs a field name with the value that was written, so a unique
/// violation on `<table>_<field>_key` can report the offending value.
fn map_sqlx_error(operation: &str, err: sqlx::Error, values: &[(&str, &str)]) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            match db_err.code().as_deref() {
                Some("23505") => {
                    let constraint = db_err.constraint().unwrap_or_default();
                    values
                        .iter()
                        .find(|(field, _)| {
                            constraint.ends_with(&format!("_{field}_key"))
                                || constraint.ends_with(&format!("_{field}"))
                        })
                        .map(|(field, value)| StoreError::unique(*field, *value))
                        .unwrap_or_else(|| StoreError::unique(constraint, ""))
                }
                Some("23503") => StoreError::NotFound,
                _ => StoreError::backend(format!(
                    "database error in {}: {}",
                    operation,
                    db_err.message()
                )),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::PoolClosed => {
            StoreError::backend(format!("connection pool closed in {}", operation))
        }
        other => StoreError::backend(format!("sqlx error in {}: {}", operation, other)),
    }
}

// SQLx row types

fn audit_from_row(row: &PgRow) -> Result<AuditStamp, sqlx::Error> {
    Ok(AuditStamp {
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        created_by: row.try_get::<Option<i64>, _>("created_by")?.map(UserId::new),
        updated_by: row.try_get::<Option<i64>, _>("updated_by")?.map(UserId::new),
    })
}

struct UserRow(User);

impl<'r> FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let login_attempts: i32 = row.try_get("login_attempts")?;
        Ok(UserRow(User {
            id: UserId::new(row.try_get("id")?),
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            confirmed: row.try_get("confirmed")?,
            blocked: row.try_get("blocked")?,
            login_attempts: u32::try_from(login_attempts).unwrap_or(0),
            last_login_attempt: row.try_get("last_login_attempt")?,
            block_time: row.try_get("block_time")?,
            locale: row.try_get("locale")?,
            timezone: row.try_get("timezone")?,
            last_seen: row.try_get("last_seen")?,
            audit: audit_from_row(row)?,
        }))
    }
}

struct RoleRow(Role);

impl<'r> FromRow<'r, PgRow> for RoleRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(RoleRow(Role {
            id: RoleId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            audit: audit_from_row(row)?,
        }))
    }
}

struct PermissionRow(Permission);

impl<'r> FromRow<'r, PgRow> for PermissionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(PermissionRow(Permission {
            id: PermissionId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            color: row.try_get("color")?,
            audit: audit_from_row(row)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_qualifies_each_column() {
        assert_eq!(prefixed("r", "id, name"), "r.id, r.name");
    }

    #[test]
    fn schema_declares_every_table() {
        for table in ["users", "roles", "permissions", "role_permission", "user_role"] {
            assert!(SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {table} ")));
        }
    }
}
