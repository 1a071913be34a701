//! Account administration.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use rolegate_core::UserId;

use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user).delete(delete_user))
        .route("/users/:id/roles", get(user_roles))
        .route("/users/:id/block", post(block_user))
        .route("/users/:id/unblock", post(unblock_user))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(services.accounts.list_users().await?))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<UserId>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(services.accounts.get_user(id).await?))
}

pub async fn user_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<UserId>,
) -> ApiResult<impl IntoResponse> {
    services.accounts.get_user(id).await?;
    Ok(Json(services.authz.user_roles(id).await?))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<UserId>,
) -> ApiResult<impl IntoResponse> {
    services.accounts.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /users/:id/block - permanent until unblocked
pub async fn block_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<UserId>,
) -> ApiResult<impl IntoResponse> {
    let user = services.accounts.block_account(id, Some(current.id())).await?;
    Ok(Json(user))
}

pub async fn unblock_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<UserId>,
) -> ApiResult<impl IntoResponse> {
    let user = services
        .accounts
        .unblock_account(id, Some(current.id()))
        .await?;
    Ok(Json(user))
}
