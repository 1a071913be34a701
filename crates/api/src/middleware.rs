use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, info};

use rolegate_auth::{AccountService, AuthError, AuthorizationEngine, Requirement};

use crate::app::errors::ApiError;
use crate::context::CurrentUser;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "rolegate_session";

pub const LOGIN_PATH: &str = "/auth/login";
pub const UNCONFIRMED_PATH: &str = "/auth/unconfirmed";

#[derive(Clone)]
pub struct AuthState {
    pub accounts: Arc<AccountService>,
}

/// Resolve the session token to a `CurrentUser`.
///
/// Anonymous, expired and blocked sessions are sent to the login page.
pub async fn session_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = session_token(req.headers()).map(str::to_owned) else {
        return Redirect::to(LOGIN_PATH).into_response();
    };

    let user = match state.accounts.authenticate_session(&token).await {
        Ok(user) => user,
        Err(AuthError::Token(e)) => {
            debug!(error = %e, "rejected session token");
            return Redirect::to(LOGIN_PATH).into_response();
        }
        Err(e) if e == AuthError::not_found() => {
            return Redirect::to(LOGIN_PATH).into_response();
        }
        Err(e) => return ApiError::from(e).into_response(),
    };

    match state.accounts.is_blocked(user.id).await {
        Ok(false) => {}
        Ok(true) => {
            info!(user_id = %user.id, "session refused for blocked account");
            return Redirect::to(LOGIN_PATH).into_response();
        }
        Err(e) => return ApiError::from(e).into_response(),
    }

    req.extensions_mut().insert(CurrentUser::new(user));
    next.run(req).await
}

/// Send unconfirmed accounts to the confirmation notice.
///
/// Must run after `session_middleware`.
pub async fn require_confirmed(req: Request, next: Next) -> Response {
    let confirmed = req
        .extensions()
        .get::<CurrentUser>()
        .map(|current| current.user().confirmed);
    match confirmed {
        Some(true) => next.run(req).await,
        Some(false) => Redirect::to(UNCONFIRMED_PATH).into_response(),
        None => Redirect::to(LOGIN_PATH).into_response(),
    }
}

/// Authorization requirement attached to a group of routes.
#[derive(Clone)]
pub struct Guard {
    authz: Arc<AuthorizationEngine>,
    requirement: Requirement,
}

pub fn require_role(authz: Arc<AuthorizationEngine>, role: &str) -> Guard {
    Guard {
        authz,
        requirement: Requirement::role(role),
    }
}

pub fn require_role_permission(
    authz: Arc<AuthorizationEngine>,
    role: &str,
    permission: &str,
) -> Guard {
    Guard {
        authz,
        requirement: Requirement::role_permission(role, permission),
    }
}

/// Reject the request with 403 unless the current user meets the guard.
pub async fn enforce(State(guard): State<Guard>, req: Request, next: Next) -> Response {
    let Some(user_id) = req.extensions().get::<CurrentUser>().map(CurrentUser::id) else {
        return Redirect::to(LOGIN_PATH).into_response();
    };

    match guard.authz.authorize(user_id, &guard.requirement).await {
        Ok(()) => next.run(req).await,
        Err(e) => {
            debug!(user_id = %user_id, requirement = %guard.requirement, "access denied");
            ApiError::from(e).into_response()
        }
    }
}

/// Session token from the cookie, falling back to a bearer header.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    cookie_token(headers).or_else(|| bearer_token(headers))
}

fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// `Set-Cookie` value for a fresh session.
pub fn session_cookie(token: &str, max_age_seconds: i64) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}")
}

/// `Set-Cookie` value that clears the session.
pub fn cleared_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; rolegate_session=abc.def"),
        );
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer other"));
        assert_eq!(session_token(&headers), Some("abc.def"));
    }

    #[test]
    fn bearer_is_used_without_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer  tok "));
        assert_eq!(session_token(&headers), Some("tok"));
    }

    #[test]
    fn empty_values_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("rolegate_session="));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        assert!(cleared_session_cookie().contains("Max-Age=0"));
        assert!(session_cookie("t", 300).starts_with("rolegate_session=t;"));
    }
}
