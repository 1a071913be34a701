//! Registration, login, confirmation and password reset.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::app::dto::{
    LoginRequest, NewPasswordRequest, RegisterRequest, ResetRequest, SessionResponse,
};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::CurrentUser;
use crate::middleware::{cleared_session_cookie, session_cookie};

/// Endpoints reachable without a session.
pub fn public_router() -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/unconfirmed", get(unconfirmed))
        .route("/auth/reset_password", post(request_reset))
        .route("/auth/reset_password/:token", post(reset_password))
}

/// Endpoints that need a session but not a confirmed account.
pub fn session_router() -> Router {
    Router::new()
        .route("/auth/confirm", post(resend_confirmation))
        .route("/auth/confirm/:token", post(confirm))
}

/// POST /auth/register
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = services
        .accounts
        .register(&body.username, &body.email, &body.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /auth/login - sets the session cookie and returns the token
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let session = services.accounts.login(&body.email, &body.password).await?;
    let max_age = session.token.claims.exp - session.token.claims.iat;
    let cookie = session_cookie(&session.token.token, max_age);
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(SessionResponse::from(session)),
    ))
}

/// POST /auth/logout
///
/// Tokens are stateless; logging out only drops the cookie.
pub async fn logout() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, cleared_session_cookie())],
    )
}

/// GET /auth/unconfirmed - landing target for sessions of unconfirmed accounts
pub async fn unconfirmed() -> impl IntoResponse {
    Json(json!({
        "message": "account not confirmed; follow the link in the confirmation message or request a new one",
    }))
}

/// POST /auth/reset_password
pub async fn request_reset(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<ResetRequest>,
) -> ApiResult<impl IntoResponse> {
    services.accounts.request_password_reset(&body.email).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /auth/reset_password/:token
pub async fn reset_password(
    Extension(services): Extension<Arc<AppServices>>,
    Path(token): Path<String>,
    Json(body): Json<NewPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = services
        .accounts
        .reset_password(&token, &body.password)
        .await?;
    Ok(Json(user))
}

/// POST /auth/confirm - queue another confirmation message
pub async fn resend_confirmation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    services.accounts.resend_confirmation(current.id()).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /auth/confirm/:token
pub async fn confirm(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(token): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let changed = services.accounts.confirm(current.id(), &token).await?;
    Ok(Json(json!({ "confirmed": true, "changed": changed })))
}
