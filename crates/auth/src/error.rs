//! Error taxonomy for the auth services.
//!
//! Domain failures come from `rolegate-core`; this module adds the store, token
//! and credential layers and the aggregate `AuthError` returned by services.

use thiserror::Error;

use rolegate_core::DomainError;

/// Persistence failure reported by a store adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    #[error("unique constraint violated on {field}: '{value}'")]
    UniqueViolation { field: String, value: String },

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn unique(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token is invalid")]
    Invalid,

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("invalid hashing parameters: {0}")]
    Params(String),
}

/// Error returned by account, authorization and registry services.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is blocked")]
    AccountBlocked,
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AuthError::Domain(DomainError::NotFound),
            StoreError::UniqueViolation { value, .. } => {
                AuthError::Domain(DomainError::duplicate_name(value))
            }
            other => AuthError::Store(other),
        }
    }
}

impl AuthError {
    pub fn not_found() -> Self {
        AuthError::Domain(DomainError::NotFound)
    }

    pub fn unauthorized() -> Self {
        AuthError::Domain(DomainError::Unauthorized)
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_becomes_duplicate_name() {
        let err: AuthError = StoreError::unique("email", "a@example.com").into();
        assert_eq!(
            err,
            AuthError::Domain(DomainError::DuplicateName("a@example.com".into()))
        );
    }

    #[test]
    fn backend_errors_stay_store_errors() {
        let err: AuthError = StoreError::backend("connection reset").into();
        assert!(matches!(err, AuthError::Store(StoreError::Backend(_))));
    }
}
