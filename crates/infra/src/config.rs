//! Configuration loading from the process environment.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;

use chrono::Duration;

use rolegate_auth::{AuthSettings, TokenKeys};

pub use rolegate_auth::ConfigError;

pub const SECRET_KEY: &str = "ROLEGATE_SECRET_KEY";
pub const PREVIOUS_SECRET_KEYS: &str = "ROLEGATE_PREVIOUS_SECRET_KEYS";
pub const ADMIN_EMAILS: &str = "ROLEGATE_ADMIN_EMAILS";
pub const MAX_LOGIN_ATTEMPTS: &str = "ROLEGATE_MAX_LOGIN_ATTEMPTS";
pub const BLOCK_SECONDS: &str = "ROLEGATE_BLOCK_SECONDS";
pub const TOKEN_TTL_SECONDS: &str = "ROLEGATE_TOKEN_TTL_SECONDS";
pub const CACHE_TTL_SECONDS: &str = "ROLEGATE_CACHE_TTL_SECONDS";
pub const SITE_NAME: &str = "ROLEGATE_SITE_NAME";
pub const DATABASE_URL: &str = "DATABASE_URL";
pub const BIND: &str = "ROLEGATE_BIND";

const DEFAULT_BIND: &str = "0.0.0.0:8080";

/// Source of configuration variables.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEnv;

impl EnvSource for SystemEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Everything the service needs at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub settings: AuthSettings,
    pub keys: TokenKeys,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub bind: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&SystemEnv)
    }

    pub fn from_source(env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let secret = non_empty(env, SECRET_KEY).ok_or(ConfigError::MissingSecret)?;
        let keys = TokenKeys::new(secret)?.with_previous(list(env, PREVIOUS_SECRET_KEYS));

        let defaults = AuthSettings::default();
        let settings = AuthSettings {
            max_login_attempts: parsed(env, MAX_LOGIN_ATTEMPTS)?
                .unwrap_or(defaults.max_login_attempts),
            block_duration: seconds(env, BLOCK_SECONDS)?.unwrap_or(defaults.block_duration),
            token_ttl: seconds(env, TOKEN_TTL_SECONDS)?.unwrap_or(defaults.token_ttl),
            cache_ttl: seconds(env, CACHE_TTL_SECONDS)?.unwrap_or(defaults.cache_ttl),
            admin_emails: list(env, ADMIN_EMAILS),
            site_name: non_empty(env, SITE_NAME).unwrap_or(defaults.site_name),
        };
        settings.validate()?;

        let bind_raw = non_empty(env, BIND).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw.parse::<SocketAddr>().map_err(|e| invalid(BIND, e))?;

        Ok(Self {
            settings,
            keys,
            database_url: non_empty(env, DATABASE_URL),
            bind,
        })
    }
}

fn non_empty(env: &dyn EnvSource, key: &str) -> Option<String> {
    env.var(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Comma-separated list; blank items are dropped.
fn list(env: &dyn EnvSource, key: &str) -> Vec<String> {
    env.var(key)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parsed<T>(env: &dyn EnvSource, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    non_empty(env, key)
        .map(|v| v.parse::<T>().map_err(|e| invalid(key, e)))
        .transpose()
}

fn seconds(env: &dyn EnvSource, key: &str) -> Result<Option<Duration>, ConfigError> {
    Ok(parsed::<i64>(env, key)?.map(Duration::seconds))
}

fn invalid(key: &str, err: impl core::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: err.to_string(),
    }
}
