use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rolegate_core::UserId;

use crate::error::TokenError;

/// What a token may be used for. A token is only accepted for its own purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    Session,
    Confirm,
    Reset,
}

impl core::fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TokenPurpose::Session => f.write_str("session"),
            TokenPurpose::Confirm => f.write_str("confirm"),
            TokenPurpose::Reset => f.write_str("reset"),
        }
    }
}

/// Signed token payload. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject user.
    pub sub: UserId,

    pub purpose: TokenPurpose,

    /// Issued-at.
    pub iat: i64,

    /// Expiration.
    pub exp: i64,
}

impl TokenClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.exp, 0)
    }
}

/// Deterministically validate the time window of decoded claims.
///
/// Signature and purpose checks happen in `TokenService::verify`; this only
/// looks at `iat`/`exp`. A token is expired from the instant `now == exp`.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), TokenError> {
    if claims.exp <= claims.iat {
        return Err(TokenError::Invalid);
    }
    let now = now.timestamp();
    if now < claims.iat {
        return Err(TokenError::Invalid);
    }
    if now >= claims.exp {
        return Err(TokenError::Expired);
    }
    Ok(())
}
