use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use rolegate_auth::{
    AccountService, AuthError, AuthSettings, AuthorizationEngine, CredentialStore, MailDispatcher,
    RbacRegistry, RbacStore, StoreError, TokenKeys, TokenService,
};
use rolegate_core::{Clock, SystemClock};
use rolegate_infra::{
    AppConfig, BackgroundMailDispatcher, InMemoryRbacStore, LogMailer, MailError,
    PostgresRbacStore, ShardedAuthzCache,
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("store initialization failed: {0}")]
    Store(#[from] StoreError),

    #[error("seeding defaults failed: {0}")]
    Seed(#[from] AuthError),

    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppServices {
    pub accounts: Arc<AccountService>,
    pub authz: Arc<AuthorizationEngine>,
    pub registry: Arc<RbacRegistry>,
    pub settings: AuthSettings,
}

/// Collaborators that differ between production and tests.
pub struct ServiceParts {
    pub store: Arc<dyn RbacStore>,
    pub mail: Arc<dyn MailDispatcher>,
    pub clock: Arc<dyn Clock>,
    pub credentials: CredentialStore,
    pub keys: TokenKeys,
    pub settings: AuthSettings,
}

impl AppServices {
    /// Wire the services and seed the default roles and permissions.
    pub async fn assemble(parts: ServiceParts) -> Result<Self, ServiceError> {
        let ServiceParts {
            store,
            mail,
            clock,
            credentials,
            keys,
            settings,
        } = parts;

        let cache = Arc::new(ShardedAuthzCache::new(settings.cache_ttl, clock.clone()));
        let authz = Arc::new(AuthorizationEngine::new(
            store.clone(),
            cache,
            clock.clone(),
            settings.clone(),
        ));
        let tokens = Arc::new(TokenService::new(keys, clock.clone(), settings.token_ttl));
        let accounts = Arc::new(AccountService::new(
            store.clone(),
            tokens,
            credentials,
            authz.clone(),
            mail,
            clock.clone(),
            settings.clone(),
        ));
        let registry = Arc::new(RbacRegistry::new(store, authz.clone(), clock));

        if registry.seed_defaults().await? {
            info!("seeded default roles and permissions");
        }

        Ok(Self {
            accounts,
            authz,
            registry,
            settings,
        })
    }
}

/// Build production services: Postgres when `DATABASE_URL` is set, the
/// in-memory store otherwise. Mail goes to the log on a worker thread.
pub async fn build_services(config: &AppConfig) -> Result<Arc<AppServices>, ServiceError> {
    let store: Arc<dyn RbacStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresRbacStore::connect(url).await?;
            store.migrate().await?;
            info!("using postgres store");
            Arc::new(store)
        }
        None => {
            info!("DATABASE_URL not set; using in-memory store");
            Arc::new(InMemoryRbacStore::new())
        }
    };

    let mail = Arc::new(BackgroundMailDispatcher::spawn(LogMailer)?);

    let services = AppServices::assemble(ServiceParts {
        store,
        mail,
        clock: Arc::new(SystemClock),
        credentials: CredentialStore::default(),
        keys: config.keys.clone(),
        settings: config.settings.clone(),
    })
    .await?;

    Ok(Arc::new(services))
}
