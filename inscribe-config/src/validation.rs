// Configuration validation

use crate::{ConfigError, Result};
use std::fmt::Display;

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Configuration validator with rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    pub fn min_len(value: &str, min: usize, field: &str) -> Result<()> {
        if value.len() < min {
            return Err(ConfigError::ValidationError(format!(
                "{} must be at least {} characters",
                field, min
            )));
        }
        Ok(())
    }

    /// Validate that a number is within range (inclusive)
    pub fn in_range<T: PartialOrd + Display>(value: T, min: T, max: T, field: &str) -> Result<()> {
        if value < min || value > max {
            return Err(ConfigError::ValidationError(format!(
                "{} must be between {} and {} (got {})",
                field, min, max, value
            )));
        }
        Ok(())
    }

    /// Validate URL format
    pub fn is_url(value: &str, field: &str) -> Result<()> {
        let rest = value
            .strip_prefix("http://")
            .or_else(|| value.strip_prefix("https://"));
        match rest {
            Some(rest) if !rest.is_empty() => Ok(()),
            _ => Err(ConfigError::ValidationError(format!(
                "{} must be a valid http(s) URL",
                field
            ))),
        }
    }

    /// Validate a bare DNS hostname (no scheme, port or path)
    pub fn is_hostname(value: &str, field: &str) -> Result<()> {
        let valid = !value.is_empty()
            && value.len() <= 253
            && value.split('.').all(|label| {
                !label.is_empty()
                    && label.len() <= 63
                    && !label.starts_with('-')
                    && !label.ends_with('-')
                    && label
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            });
        if !valid {
            return Err(ConfigError::ValidationError(format!(
                "{} must be a lowercase hostname such as example.com",
                field
            )));
        }
        Ok(())
    }

    /// Validate port number
    pub fn is_port(value: u16, field: &str) -> Result<()> {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} must be a valid port number",
                field
            )));
        }
        Ok(())
    }
}
