// Configuration file loaders

use crate::{ConfigError, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
    Env,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            "env" => Some(FileFormat::Env),
            _ => None,
        }
    }

    /// Detect the format of `path`. A bare `.env` file counts as `Env`.
    pub fn detect(path: &Path) -> Option<Self> {
        if path.file_name().and_then(|n| n.to_str()) == Some(".env") {
            return Some(FileFormat::Env);
        }
        path.extension()
            .and_then(|s| s.to_str())
            .and_then(Self::from_extension)
    }
}

/// Configuration file loader
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Auto-detect format from file name
    pub fn auto(path: &Path) -> Result<Self> {
        let format = FileFormat::detect(path).ok_or_else(|| ConfigError::LoadError {
            path: path.display().to_string(),
            reason: "unsupported or missing file extension".to_string(),
        })?;
        Ok(Self::new(format))
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Load configuration from file
    pub fn load_file(&self, path: &Path) -> Result<Value> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        self.parse(&content)
    }

    /// Parse configuration from string
    pub fn parse(&self, content: &str) -> Result<Value> {
        match self.format {
            FileFormat::Json => parse_json(content),
            FileFormat::Toml => parse_toml(content),
            FileFormat::Env => Ok(parse_env(content)),
        }
    }
}

fn parse_json(content: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| ConfigError::ParseError(format!("JSON parse error: {}", e)))?;
    if !value.is_object() {
        return Err(ConfigError::ParseError(
            "JSON configuration must be an object".to_string(),
        ));
    }
    Ok(value)
}

fn parse_toml(content: &str) -> Result<Value> {
    let toml_value: toml::Table = toml::from_str(content)
        .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

    serde_json::to_value(toml_value)
        .map_err(|e| ConfigError::ParseError(format!("TOML to JSON conversion error: {}", e)))
}

/// `KEY=value` lines into a flat string object. Comments, blank lines and
/// an optional `export ` prefix are skipped.
fn parse_env(content: &str) -> Value {
    let mut map = serde_json::Map::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            map.insert(key.to_string(), Value::String(value.to_string()));
        }
    }

    Value::Object(map)
}
