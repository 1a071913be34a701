use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;

pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Routes guarded by the `moderate` role's `write` permission.
pub fn moderation_router() -> Router {
    Router::new().route("/moderation/check", get(moderation_check))
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /moderation/check - succeeds only past the role-permission guard
pub async fn moderation_check() -> impl IntoResponse {
    Json(json!({ "allowed": true }))
}
