//! Tunables consumed by the account state machine, token service and
//! authorization cache.

use chrono::Duration;
use thiserror::Error;

/// Languages a user may select with `update_locale`.
pub const SUPPORTED_LOCALES: &[&str] = &["en", "es"];

pub const DEFAULT_LOCALE: &str = "en";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("token signing secret is missing or empty")]
    MissingSecret,

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Account and authorization settings.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Consecutive failed logins before a throttle block.
    pub max_login_attempts: u32,
    /// Length of a throttle block.
    pub block_duration: Duration,
    /// Default lifetime of issued tokens.
    pub token_ttl: Duration,
    /// Lifetime of memoized authorization answers.
    pub cache_ttl: Duration,
    /// Addresses that are always granted the admin role.
    pub admin_emails: Vec<String>,
    /// Used in outbound message bodies.
    pub site_name: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            max_login_attempts: 5,
            block_duration: Duration::minutes(1),
            token_ttl: Duration::seconds(300),
            cache_ttl: Duration::seconds(300),
            admin_emails: Vec::new(),
            site_name: "rolegate".to_string(),
        }
    }
}

impl AuthSettings {
    pub fn with_admin_emails<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admin_emails = emails.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_login_attempts(mut self, max: u32) -> Self {
        self.max_login_attempts = max;
        self
    }

    pub fn with_block_duration(mut self, duration: Duration) -> Self {
        self.block_duration = duration;
        self
    }

    /// Exact address match, ignoring ASCII case and surrounding whitespace.
    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim();
        self.admin_emails
            .iter()
            .any(|admin| admin.trim().eq_ignore_ascii_case(email))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_login_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "max_login_attempts".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        for (key, value) in [
            ("block_duration", self.block_duration),
            ("token_ttl", self.token_ttl),
            ("cache_ttl", self.cache_ttl),
        ] {
            if value <= Duration::zero() {
                return Err(ConfigError::Invalid {
                    key: key.to_string(),
                    message: "must be positive".to_string(),
                });
            }
        }
        Ok(())
    }
}
