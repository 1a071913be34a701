//! Role administration and role assignment.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use rolegate_core::{RoleId, UserId};

use crate::app::dto::{ChangedResponse, RoleRequest};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:id", get(get_role).put(update_role).delete(delete_role))
        .route("/roles/:id/users", get(role_users))
        .route("/roles/:id/users/:user_id", put(assign_role).delete(unassign_role))
}

/// GET /roles
pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(services.registry.list_roles().await?))
}

/// POST /roles
pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<RoleRequest>,
) -> ApiResult<impl IntoResponse> {
    let permissions = body.permissions.unwrap_or_default();
    let role = services
        .registry
        .create_role(&body.name, &body.description, &permissions, Some(current.id()))
        .await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// GET /roles/:id - the role and its linked permissions
pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<RoleId>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(services.registry.get_role_details(id).await?))
}

/// PUT /roles/:id
pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<RoleId>,
    Json(body): Json<RoleRequest>,
) -> ApiResult<impl IntoResponse> {
    let role = services
        .registry
        .update_role(
            id,
            &body.name,
            &body.description,
            body.permissions.as_deref(),
            Some(current.id()),
        )
        .await?;
    Ok(Json(role))
}

/// DELETE /roles/:id
pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<RoleId>,
) -> ApiResult<impl IntoResponse> {
    services.registry.delete_role(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /roles/:id/users
pub async fn role_users(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<RoleId>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(services.registry.users_with_role(id).await?))
}

/// PUT /roles/:id/users/:user_id
pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path((role, user)): Path<(RoleId, UserId)>,
) -> ApiResult<impl IntoResponse> {
    let changed = services
        .authz
        .add_role(user, role, Some(current.id()))
        .await?;
    Ok(Json(ChangedResponse { changed }))
}

/// DELETE /roles/:id/users/:user_id
pub async fn unassign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path((role, user)): Path<(RoleId, UserId)>,
) -> ApiResult<impl IntoResponse> {
    let changed = services
        .authz
        .remove_role(user, role, Some(current.id()))
        .await?;
    Ok(Json(ChangedResponse { changed }))
}
