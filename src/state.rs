//! Shared application state

use crate::error::StartupError;
use inscribe_config::PlatformSettings;
use inscribe_jwt::{JwtConfig, JwtService, SessionCookie};
use inscribe_log::info;
use inscribe_tenancy::{
    DirectoryCache, DirectorySource, DomainProvisioner, HostResolver, HttpDirectorySource,
    LogResetNotifier, NoOpProvisioner, RegistryDirectorySource, ResetNotifier, StorageConfig,
    StorageGateway, TenantRegistry, ZoneApiProvisioner,
};
use std::sync::Arc;
use std::time::Duration;

/// Request timeout of the remote directory client. Request-path lookups are
/// bounded separately by the resolver.
const DIRECTORY_CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything handlers need, built once at startup
pub struct AppState {
    pub settings: PlatformSettings,
    pub storage: Arc<StorageGateway>,
    pub registry: Arc<TenantRegistry>,
    pub jwt: JwtService,
    pub cookie: SessionCookie,
    pub cache: Arc<DirectoryCache>,
    pub resolver: Arc<HostResolver>,
    pub notifier: Arc<dyn ResetNotifier>,
}

impl AppState {
    /// Wire the stack from validated settings
    pub fn from_settings(settings: PlatformSettings) -> Result<Arc<Self>, StartupError> {
        Self::with_notifier(settings, Arc::new(LogResetNotifier))
    }

    /// Like [`AppState::from_settings`], delivering reset tokens through `notifier`
    pub fn with_notifier(
        settings: PlatformSettings,
        notifier: Arc<dyn ResetNotifier>,
    ) -> Result<Arc<Self>, StartupError> {
        let storage = Arc::new(StorageGateway::new(
            StorageConfig::new(&settings.storage.data_dir)
                .with_max_open_stores(settings.storage.max_open_stores),
        ));

        let provisioner: Arc<dyn DomainProvisioner> = match (
            &settings.provisioning.api_token,
            &settings.provisioning.account_id,
        ) {
            (Some(token), Some(account)) => Arc::new(ZoneApiProvisioner::new(
                &settings.provisioning.zone_api_base,
                token,
                account,
                Duration::from_millis(settings.provisioning.timeout_ms),
            )?),
            _ => {
                info!("DNS provisioning disabled, custom domains are recorded only");
                Arc::new(NoOpProvisioner)
            }
        };

        let registry = Arc::new(TenantRegistry::new(
            Arc::clone(&storage),
            &settings.domain.main_domain,
            provisioner,
        ));

        let source: Arc<dyn DirectorySource> = match &settings.directory.url {
            Some(url) => {
                info!(url = %url, "Using remote tenant directory");
                Arc::new(HttpDirectorySource::new(url, DIRECTORY_CLIENT_TIMEOUT)?)
            }
            None => Arc::new(RegistryDirectorySource::new(Arc::clone(&registry))),
        };

        let cache = Arc::new(
            DirectoryCache::new(Arc::clone(&source))
                .with_max_age(settings.directory.refresh_interval()),
        );
        let resolver = Arc::new(
            HostResolver::new(&settings.domain.main_domain, Arc::clone(&cache), source)
                .with_lookup_timeout(settings.directory.lookup_timeout()),
        );

        let ttl = Duration::from_secs(settings.session.ttl_secs.max(0) as u64);
        let jwt = JwtService::new(
            JwtConfig::new(&settings.session.secret)
                .with_expiration(ttl)
                .with_issuer("inscribe"),
        )?;
        let cookie = SessionCookie::new(&settings.session.cookie_name)
            .with_secure(settings.session.secure_cookie)
            .with_max_age(ttl);

        Ok(Arc::new(Self {
            settings,
            storage,
            registry,
            jwt,
            cookie,
            cache,
            resolver,
            notifier,
        }))
    }

    pub fn main_domain(&self) -> &str {
        &self.settings.domain.main_domain
    }
}
