//! Configuration management for Inscribe services
//!
//! [`ConfigManager`] holds a JSON tree assembled from files and overrides;
//! [`PlatformSettings`] is the typed, validated view the server runs on.

pub mod env;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use settings::{
    DirectorySettings, DomainSettings, PlatformSettings, ProvisioningSettings, ServerSettings,
    SessionSettings, StorageSettings,
};
pub use validation::{ConfigValidator, Validate};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Main configuration manager
///
/// Keys may be dotted paths (`server.port`) addressing nested objects.
#[derive(Clone, Default)]
pub struct ConfigManager {
    config: Arc<RwLock<Map<String, Value>>>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a JSON, TOML or `.env` file into the configuration
    pub fn load_file(&self, path: &Path, format: FileFormat) -> Result<()> {
        let loader = ConfigLoader::new(format);
        let data = loader.load_file(path)?;
        self.merge_value(data);
        Ok(())
    }

    /// Deep-merge an object into the configuration
    pub fn merge_value(&self, value: Value) {
        if let Value::Object(map) = value {
            let mut config = self.config.write();
            for (key, value) in map {
                merge_into(&mut config, key, value);
            }
        }
    }

    /// Set a configuration value, creating intermediate objects for dotted keys
    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        let mut config = self.config.write();
        let mut segments: Vec<&str> = key.split('.').collect();
        let leaf = segments.pop().unwrap_or(key);

        let mut node = &mut *config;
        for segment in segments {
            let entry = node
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            node = match entry {
                Value::Object(map) => map,
                _ => return Err(ConfigError::KeyNotFound(key.to_string())),
            };
        }
        node.insert(leaf.to_string(), json_value);

        Ok(())
    }

    /// Get a configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .lookup(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value).map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }

    /// Get a configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Top-level keys
    pub fn keys(&self) -> Vec<String> {
        self.config.read().keys().cloned().collect()
    }

    /// Merge configuration from another manager; `other` wins on conflicts
    pub fn merge(&self, other: &ConfigManager) {
        let snapshot = Value::Object(other.config.read().clone());
        self.merge_value(snapshot);
    }

    /// Deserialize the whole tree into `T` and validate it
    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let json_value = Value::Object(self.config.read().clone());

        let validated: T = serde_json::from_value(json_value)
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;

        validated.validate()?;

        Ok(validated)
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        let config = self.config.read();
        let mut segments = key.split('.');
        let mut current = config.get(segments.next()?)?;
        for segment in segments {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }
}

fn merge_into(target: &mut Map<String, Value>, key: String, value: Value) {
    match (target.get_mut(&key), value) {
        (Some(Value::Object(existing)), Value::Object(incoming)) => {
            for (k, v) in incoming {
                merge_into(existing, k, v);
            }
        }
        (_, value) => {
            target.insert(key, value);
        }
    }
}
