use axum::Router;

pub mod account;
pub mod auth;
pub mod permissions;
pub mod roles;
pub mod system;
pub mod users;

/// Endpoints restricted to the admin role.
pub fn admin_router() -> Router {
    Router::new()
        .merge(roles::router())
        .merge(permissions::router())
        .merge(users::router())
}
