use serde::{Deserialize, Serialize};

use rolegate_auth::{Session, User};
use rolegate_core::PermissionId;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct NewPasswordRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LocaleRequest {
    pub locale: String,
}

/// Create or update a role. On update, omitting `permissions` keeps the
/// current links.
#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub name: String,
    pub description: String,
    pub permissions: Option<Vec<PermissionId>>,
}

#[derive(Debug, Deserialize)]
pub struct PermissionRequest {
    pub name: String,
    pub description: String,
    pub color: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: i64,
    pub user: User,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            token: session.token.token,
            expires_at: session.token.claims.exp,
            user: session.user,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub roles: Vec<String>,
}

/// Result of an idempotent change: `false` when nothing had to change.
#[derive(Debug, Serialize)]
pub struct ChangedResponse {
    pub changed: bool,
}
