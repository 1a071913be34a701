use std::sync::Arc;

use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::app::dto::{LocaleRequest, MeResponse};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/me", get(me))
        .route("/account/locale", post(update_locale))
}

/// GET /me - the current account and its role names
pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let roles = services.authz.user_roles(current.id()).await?;
    Ok(Json(MeResponse {
        user: current.into_user(),
        roles: roles.into_iter().map(|r| r.name).collect(),
    }))
}

/// POST /account/locale
pub async fn update_locale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<LocaleRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = services
        .accounts
        .update_locale(current.id(), &body.locale)
        .await?;
    Ok(Json(user))
}
