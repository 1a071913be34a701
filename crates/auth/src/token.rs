//! Token service: HS256-signed, purpose-scoped, short-lived tokens.

use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

use rolegate_core::{Clock, UserId};

use crate::claims::{TokenClaims, TokenPurpose, validate_claims};
use crate::error::TokenError;
use crate::settings::ConfigError;

/// Signing secret plus older secrets still accepted for verification.
#[derive(Clone)]
pub struct TokenKeys {
    signing: String,
    previous: Vec<String>,
}

impl TokenKeys {
    pub fn new(secret: impl Into<String>) -> Result<Self, ConfigError> {
        let signing = secret.into();
        if signing.trim().is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        Ok(Self {
            signing,
            previous: Vec::new(),
        })
    }

    /// Blank entries are skipped.
    pub fn with_previous<I, S>(mut self, secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.previous = secrets
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.trim().is_empty())
            .collect();
        self
    }

    fn verification_secrets(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.signing.as_str()).chain(self.previous.iter().map(String::as_str))
    }
}

impl core::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenKeys")
            .field("signing", &"<redacted>")
            .field("previous", &self.previous.len())
            .finish()
    }
}

/// A freshly signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: Vec<DecodingKey>,
    validation: Validation,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl TokenService {
    pub fn new(keys: TokenKeys, clock: Arc<dyn Clock>, default_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // expiry is checked against the injected clock instead
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(keys.signing.as_bytes()),
            decoding: keys
                .verification_secrets()
                .map(|s| DecodingKey::from_secret(s.as_bytes()))
                .collect(),
            validation,
            clock,
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn issue(
        &self,
        user_id: UserId,
        purpose: TokenPurpose,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        let iat = self.clock.now().timestamp();
        let claims = TokenClaims {
            sub: user_id,
            purpose,
            iat,
            exp: iat + ttl.num_seconds(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;
        Ok(IssuedToken { token, claims })
    }

    pub fn issue_default(
        &self,
        user_id: UserId,
        purpose: TokenPurpose,
    ) -> Result<IssuedToken, TokenError> {
        self.issue(user_id, purpose, self.default_ttl)
    }

    /// Verify signature, purpose and expiry.
    pub fn verify(&self, token: &str, expected: TokenPurpose) -> Result<TokenClaims, TokenError> {
        let claims = self.decode(token)?;
        if claims.purpose != expected {
            debug!(
                expected = %expected,
                actual = %claims.purpose,
                "token presented for the wrong purpose"
            );
            return Err(TokenError::Invalid);
        }
        validate_claims(&claims, self.clock.now())?;
        Ok(claims)
    }

    fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        for key in &self.decoding {
            match jsonwebtoken::decode::<TokenClaims>(token, key, &self.validation) {
                Ok(data) => return Ok(data.claims),
                Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => continue,
                Err(e) => {
                    debug!(error = %e, "token rejected");
                    return Err(TokenError::Invalid);
                }
            }
        }
        Err(TokenError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolegate_core::ManualClock;

    fn service(keys: TokenKeys, clock: Arc<ManualClock>) -> TokenService {
        TokenService::new(keys, clock, Duration::seconds(300))
    }

    fn keys(secret: &str) -> TokenKeys {
        TokenKeys::new(secret).unwrap()
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(TokenKeys::new(""), Err(ConfigError::MissingSecret)));
        assert!(matches!(TokenKeys::new("   "), Err(ConfigError::MissingSecret)));
    }

    #[test]
    fn debug_redacts_secrets() {
        let rendered = format!("{:?}", keys("super-secret-value"));
        assert!(!rendered.contains("super-secret-value"));
    }

    #[test]
    fn verify_before_ttl_then_expired() {
        let clock = Arc::new(ManualClock::starting_now());
        let svc = service(keys("k1"), clock.clone());

        let issued = svc.issue(UserId::new(3), TokenPurpose::Session, Duration::seconds(60)).unwrap();
        let claims = svc.verify(&issued.token, TokenPurpose::Session).unwrap();
        assert_eq!(claims, issued.claims);
        assert_eq!(claims.sub, UserId::new(3));

        clock.advance(Duration::seconds(59));
        assert!(svc.verify(&issued.token, TokenPurpose::Session).is_ok());

        clock.advance(Duration::seconds(1));
        assert_eq!(
            svc.verify(&issued.token, TokenPurpose::Session),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn default_ttl_is_used() {
        let clock = Arc::new(ManualClock::starting_now());
        let svc = service(keys("k1"), clock);
        let issued = svc.issue_default(UserId::new(1), TokenPurpose::Confirm).unwrap();
        assert_eq!(issued.claims.exp - issued.claims.iat, 300);
    }

    #[test]
    fn cross_purpose_use_is_rejected() {
        let clock = Arc::new(ManualClock::starting_now());
        let svc = service(keys("k1"), clock);
        let reset = svc.issue_default(UserId::new(1), TokenPurpose::Reset).unwrap();
        assert_eq!(
            svc.verify(&reset.token, TokenPurpose::Session),
            Err(TokenError::Invalid)
        );
        assert!(svc.verify(&reset.token, TokenPurpose::Reset).is_ok());
    }

    #[test]
    fn wrong_key_and_garbage_are_invalid() {
        let clock = Arc::new(ManualClock::starting_now());
        let a = service(keys("key-a"), clock.clone());
        let b = service(keys("key-b"), clock);

        let token = a.issue_default(UserId::new(1), TokenPurpose::Session).unwrap().token;
        assert_eq!(b.verify(&token, TokenPurpose::Session), Err(TokenError::Invalid));
        assert_eq!(a.verify("garbage", TokenPurpose::Session), Err(TokenError::Invalid));
        assert_eq!(a.verify("", TokenPurpose::Session), Err(TokenError::Invalid));

        let mut tampered = token.clone();
        tampered.push('x');
        assert_eq!(a.verify(&tampered, TokenPurpose::Session), Err(TokenError::Invalid));
    }

    #[test]
    fn previous_secrets_still_verify() {
        let clock = Arc::new(ManualClock::starting_now());
        let old = service(keys("old-key"), clock.clone());
        let token = old.issue_default(UserId::new(9), TokenPurpose::Session).unwrap().token;

        let rotated = service(keys("new-key").with_previous(["old-key", ""]), clock);
        let claims = rotated.verify(&token, TokenPurpose::Session).unwrap();
        assert_eq!(claims.sub, UserId::new(9));

        // new tokens are signed with the new key only
        let fresh = rotated.issue_default(UserId::new(9), TokenPurpose::Session).unwrap().token;
        assert_eq!(old.verify(&fresh, TokenPurpose::Session), Err(TokenError::Invalid));
    }
}
