//! Infrastructure layer: stores, cache, mail delivery, configuration.

pub mod cache;
pub mod config;
pub mod mail;
pub mod store;

mod integration_tests;

pub use cache::ShardedAuthzCache;
pub use config::{AppConfig, ConfigError, EnvSource, SystemEnv};
pub use mail::{BackgroundMailDispatcher, DispatchStats, LogMailer, MailError, Mailer, MemoryMailer};
pub use store::{InMemoryRbacStore, PostgresRbacStore};
