//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store, cache, mail and service construction
//! - `routes/`: HTTP handlers, one file per area
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, middleware::from_fn, middleware::from_fn_with_state};
use tower::ServiceBuilder;

use rolegate_auth::ADMIN_ROLE;

use crate::middleware::{self, AuthState};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn router(services: Arc<AppServices>) -> Router {
    let auth_state = AuthState {
        accounts: services.accounts.clone(),
    };

    // Session only: confirmation itself must be reachable while unconfirmed.
    let session = routes::auth::session_router()
        .layer(from_fn_with_state(auth_state.clone(), middleware::session_middleware));

    let admin = routes::admin_router().route_layer(from_fn_with_state(
        middleware::require_role(services.authz.clone(), ADMIN_ROLE),
        middleware::enforce,
    ));

    let moderation = routes::system::moderation_router().route_layer(from_fn_with_state(
        middleware::require_role_permission(services.authz.clone(), "moderate", "write"),
        middleware::enforce,
    ));

    // Layers run outermost-last: session, then confirmation, then any guard.
    let confirmed = routes::account::router()
        .merge(admin)
        .merge(moderation)
        .layer(from_fn(middleware::require_confirmed))
        .layer(from_fn_with_state(auth_state, middleware::session_middleware));

    Router::new()
        .merge(routes::system::router())
        .merge(routes::auth::public_router())
        .merge(session)
        .merge(confirmed)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
