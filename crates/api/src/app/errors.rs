use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use rolegate_auth::{AuthError, TokenError};
use rolegate_core::DomainError;

/// Handler error; renders as `{ "error": code, "message": text }`.
#[derive(Debug)]
pub struct ApiError(pub AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(AuthError::Domain(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        auth_error_to_response(self.0)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::Domain(e) => domain_error_to_response(e),
        AuthError::Token(TokenError::Expired) => {
            json_error(StatusCode::BAD_REQUEST, "token_expired", "token has expired")
        }
        AuthError::Token(TokenError::Invalid) => {
            json_error(StatusCode::BAD_REQUEST, "token_invalid", "token is invalid")
        }
        AuthError::InvalidCredentials => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid email or password",
        ),
        AuthError::AccountBlocked => {
            json_error(StatusCode::LOCKED, "account_blocked", "account is blocked")
        }
        e @ (AuthError::Token(TokenError::Encoding(_))
        | AuthError::Store(_)
        | AuthError::Credential(_)) => {
            error!(error = %e, "request failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal server error",
            )
        }
    }
}

fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::DuplicateName(name) => json_error(
            StatusCode::CONFLICT,
            "duplicate_name",
            format!("'{name}' is already taken"),
        ),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::Unauthorized => json_error(StatusCode::FORBIDDEN, "forbidden", "forbidden"),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
