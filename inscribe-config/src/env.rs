// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;

/// Environment variable loader
///
/// Reads `<PREFIX>_<KEY>` variables from the process environment, or from a
/// fixed set of variables (a parsed `.env` file, or a test fixture).
pub struct EnvLoader {
    prefix: Option<String>,
    vars: Option<HashMap<String, String>>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix, vars: None }
    }

    /// Loader backed by `vars` instead of the process environment
    pub fn from_vars<I, K, V>(prefix: Option<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix,
            vars: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Full variable name for `key`
    pub fn var_name(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }

    /// Load a specific environment variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        let full_key = self.var_name(key);
        self.raw(&full_key)
            .ok_or(ConfigError::KeyNotFound(full_key))
    }

    /// Load a variable if it is set and non-empty
    pub fn load_opt(&self, key: &str) -> Option<String> {
        self.load_var(key).ok().filter(|v| !v.trim().is_empty())
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }

    fn raw(&self, name: &str) -> Option<String> {
        match &self.vars {
            Some(vars) => vars.get(name).cloned(),
            None => env::var(name).ok(),
        }
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_loader_with_default() {
        let loader = EnvLoader::new(None);
        let value = loader.load_var_or("NONEXISTENT_VAR_12345", "default");
        assert_eq!(value, "default");
    }

    #[test]
    fn test_env_loader_missing_var() {
        let loader = EnvLoader::new(Some("INSCRIBE_TEST".to_string()));
        let result = loader.load_var("MISSING_VAR_67890");
        assert!(matches!(result, Err(ConfigError::KeyNotFound(k)) if k == "INSCRIBE_TEST_MISSING_VAR_67890"));
    }

    #[test]
    fn test_env_loader_prefix_from_vars() {
        let loader = EnvLoader::from_vars(
            Some("INSCRIBE".to_string()),
            [("INSCRIBE_PORT", "8080"), ("INSCRIBE_DATA_DIR", "  ")],
        );
        assert_eq!(loader.var_name("port"), "INSCRIBE_PORT");
        assert_eq!(loader.load_var("port").unwrap(), "8080");
        // Blank values are treated as unset
        assert_eq!(loader.load_opt("data_dir"), None);
    }

    #[test]
    fn test_env_loader_path_exists() {
        let loader = EnvLoader::new(None);
        if std::env::var("PATH").is_ok() {
            assert!(loader.load_var("PATH").is_ok());
        }
    }
}
