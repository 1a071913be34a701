use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use rolegate_core::PermissionId;

use crate::app::dto::PermissionRequest;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/permissions", get(list_permissions).post(create_permission))
        .route(
            "/permissions/:id",
            get(get_permission)
                .put(update_permission)
                .delete(delete_permission),
        )
}

pub async fn list_permissions(
    Extension(services): Extension<Arc<AppServices>>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(services.registry.list_permissions().await?))
}

pub async fn create_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<PermissionRequest>,
) -> ApiResult<impl IntoResponse> {
    let permission = services
        .registry
        .create_permission(
            &body.name,
            &body.description,
            body.color.as_deref(),
            Some(current.id()),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

pub async fn get_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<PermissionId>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(services.registry.get_permission(id).await?))
}

pub async fn update_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<PermissionId>,
    Json(body): Json<PermissionRequest>,
) -> ApiResult<impl IntoResponse> {
    let permission = services
        .registry
        .update_permission(
            id,
            &body.name,
            &body.description,
            body.color.as_deref(),
            Some(current.id()),
        )
        .await?;
    Ok(Json(permission))
}

pub async fn delete_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<PermissionId>,
) -> ApiResult<impl IntoResponse> {
    services.registry.delete_permission(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
