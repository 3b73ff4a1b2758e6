//! Typed platform settings
//!
//! Resolution order, later wins:
//!
//! 1. built-in defaults
//! 2. the configuration file (`--config` / `INSCRIBE_CONFIG`), JSON, TOML or `.env`
//! 3. `INSCRIBE_*` environment variables
//!
//! ```toml
//! [server]
//! port = 8080
//!
//! [domain]
//! main_domain = "inscribe.so"
//!
//! [session]
//! secret = "change-me-change-me-change-me-change-me"
//! ```

use crate::{
    ConfigError, ConfigLoader, ConfigManager, ConfigValidator, EnvLoader, FileFormat, Result,
    Validate,
};
use inscribe_log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "INSCRIBE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSettings {
    pub server: ServerSettings,
    pub domain: DomainSettings,
    pub directory: DirectorySettings,
    pub storage: StorageSettings,
    pub session: SessionSettings,
    pub provisioning: ProvisioningSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainSettings {
    /// Apex domain tenants get subdomains of, without port
    pub main_domain: String,
}

impl Default for DomainSettings {
    fn default() -> Self {
        Self {
            main_domain: "localhost".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    /// Base URL of the authoritative directory API. When unset this server
    /// answers from its own registry.
    pub url: Option<String>,
    pub refresh_interval_secs: u64,
    pub lookup_timeout_ms: u64,
    pub background_refresh: bool,
}

impl DirectorySettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            url: None,
            refresh_interval_secs: 600,
            lookup_timeout_ms: 300,
            background_refresh: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
    pub max_open_stores: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            max_open_stores: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// HS256 signing secret, at least 32 bytes
    pub secret: String,
    pub ttl_secs: i64,
    pub cookie_name: String,
    pub secure_cookie: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            secret: String::new(),
            ttl_secs: 7 * 24 * 60 * 60,
            cookie_name: "inscribe_session".to_string(),
            secure_cookie: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningSettings {
    pub zone_api_base: String,
    pub api_token: Option<String>,
    pub account_id: Option<String>,
    pub timeout_ms: u64,
}

impl ProvisioningSettings {
    /// Provisioning calls the zone API only when both credentials are present
    pub fn enabled(&self) -> bool {
        self.api_token.is_some() && self.account_id.is_some()
    }
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            zone_api_base: "https://api.cloudflare.com/client/v4".to_string(),
            api_token: None,
            account_id: None,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Clone, Copy)]
enum Kind {
    Str,
    Int,
    Bool,
}

/// `INSCRIBE_<suffix>` → settings path
const ENV_OVERRIDES: &[(&str, &str, Kind)] = &[
    ("HOST", "server.host", Kind::Str),
    ("PORT", "server.port", Kind::Int),
    ("MAX_BODY_BYTES", "server.max_body_bytes", Kind::Int),
    ("MAIN_DOMAIN", "domain.main_domain", Kind::Str),
    ("DIRECTORY_URL", "directory.url", Kind::Str),
    ("DIRECTORY_REFRESH_SECS", "directory.refresh_interval_secs", Kind::Int),
    ("DIRECTORY_LOOKUP_TIMEOUT_MS", "directory.lookup_timeout_ms", Kind::Int),
    ("DIRECTORY_BACKGROUND_REFRESH", "directory.background_refresh", Kind::Bool),
    ("DATA_DIR", "storage.data_dir", Kind::Str),
    ("MAX_OPEN_STORES", "storage.max_open_stores", Kind::Int),
    ("SESSION_SECRET", "session.secret", Kind::Str),
    ("SESSION_TTL_SECS", "session.ttl_secs", Kind::Int),
    ("SECURE_COOKIE", "session.secure_cookie", Kind::Bool),
    ("ZONE_API_BASE", "provisioning.zone_api_base", Kind::Str),
    ("ZONE_API_TOKEN", "provisioning.api_token", Kind::Str),
    ("ZONE_ACCOUNT_ID", "provisioning.account_id", Kind::Str),
];

impl PlatformSettings {
    /// Load from an optional file plus the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // A missing ./.env is not an error
        if let Ok(dotenv) = dotenvy::dotenv() {
            debug!(path = %dotenv.display(), "Loaded .env file");
        }
        Self::load_with(path, &EnvLoader::new(Some(ENV_PREFIX.to_string())))
    }

    /// Load from an optional file, with overrides read through `env`
    pub fn load_with(path: Option<&Path>, env: &EnvLoader) -> Result<Self> {
        let manager = ConfigManager::new();

        if let Some(path) = path {
            let loader = ConfigLoader::auto(path)?;
            if loader.format() == FileFormat::Env {
                let vars = loader.load_file(path)?;
                let file_env = EnvLoader::from_vars(
                    Some(ENV_PREFIX.to_string()),
                    vars.as_object()
                        .into_iter()
                        .flatten()
                        .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string()))),
                );
                apply_env_overrides(&manager, &file_env)?;
            } else {
                manager.load_file(path, loader.format())?;
            }
            info!(path = %path.display(), "Loaded configuration file");
        }

        apply_env_overrides(&manager, env)?;
        manager.load_validated()
    }
}

fn apply_env_overrides(manager: &ConfigManager, env: &EnvLoader) -> Result<()> {
    for (suffix, path, kind) in ENV_OVERRIDES {
        let Some(raw) = env.load_opt(suffix) else {
            continue;
        };
        let var = env.var_name(suffix);
        let invalid = |reason: &str| ConfigError::InvalidEnv {
            var: var.clone(),
            reason: reason.to_string(),
        };

        match kind {
            Kind::Str => manager.set(path, raw.trim())?,
            Kind::Int => {
                let n: i64 = raw.trim().parse().map_err(|_| invalid("expected an integer"))?;
                manager.set(path, n)?
            }
            Kind::Bool => {
                let b = match raw.trim().to_ascii_lowercase().as_str() {
                    "1" | "true" | "yes" | "on" => true,
                    "0" | "false" | "no" | "off" => false,
                    _ => return Err(invalid("expected true or false")),
                };
                manager.set(path, b)?
            }
        }
        debug!(var = %var, key = %path, "Applied environment override");
    }
    Ok(())
}

impl Validate for PlatformSettings {
    fn validate(&self) -> Result<()> {
        ConfigValidator::not_empty(&self.server.host, "server.host")?;
        ConfigValidator::is_port(self.server.port, "server.port")?;
        ConfigValidator::in_range(
            self.server.max_body_bytes,
            1024,
            64 * 1024 * 1024,
            "server.max_body_bytes",
        )?;

        ConfigValidator::is_hostname(&self.domain.main_domain, "domain.main_domain")?;

        if let Some(url) = &self.directory.url {
            ConfigValidator::is_url(url, "directory.url")?;
        }
        ConfigValidator::in_range(
            self.directory.refresh_interval_secs,
            1,
            24 * 60 * 60,
            "directory.refresh_interval_secs",
        )?;
        ConfigValidator::in_range(
            self.directory.lookup_timeout_ms,
            1,
            60_000,
            "directory.lookup_timeout_ms",
        )?;

        ConfigValidator::not_empty(
            &self.storage.data_dir.to_string_lossy(),
            "storage.data_dir",
        )?;
        ConfigValidator::in_range(
            self.storage.max_open_stores,
            1,
            65_536,
            "storage.max_open_stores",
        )?;

        ConfigValidator::min_len(&self.session.secret, 32, "session.secret")?;
        ConfigValidator::in_range(self.session.ttl_secs, 60, 365 * 24 * 60 * 60, "session.ttl_secs")?;
        ConfigValidator::not_empty(&self.session.cookie_name, "session.cookie_name")?;

        ConfigValidator::is_url(&self.provisioning.zone_api_base, "provisioning.zone_api_base")?;
        if self.provisioning.api_token.is_some() != self.provisioning.account_id.is_some() {
            return Err(ConfigError::ValidationError(
                "provisioning.api_token and provisioning.account_id must be set together"
                    .to_string(),
            ));
        }

        Ok(())
    }
}
