// Session token configuration

use crate::{JwtError, Result};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Validation};
use std::time::Duration;

/// Minimum HMAC secret length in bytes
pub const MIN_SECRET_LEN: usize = 32;

/// HMAC token configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared signing secret
    pub secret: String,

    /// HS256, HS384 or HS512 (default: HS256)
    pub algorithm: Algorithm,

    /// Token lifetime (default: 7 days)
    pub expires_in: Duration,

    /// Issuer (iss claim), checked on verify when set
    pub issuer: Option<String>,

    /// Leeway for time validation (seconds)
    pub leeway: u64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            algorithm: Algorithm::HS256,
            expires_in: Duration::from_secs(7 * 24 * 60 * 60),
            issuer: None,
            leeway: 0,
        }
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_expiration(mut self, duration: Duration) -> Self {
        self.expires_in = duration;
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_leeway(mut self, leeway: u64) -> Self {
        self.leeway = leeway;
        self
    }

    fn check(&self) -> Result<()> {
        if !matches!(
            self.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(JwtError::ConfigError(
                "Only HMAC algorithms are supported for session tokens".to_string(),
            ));
        }
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(JwtError::ConfigError(format!(
                "Secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        Ok(())
    }

    pub fn encoding_key(&self) -> Result<EncodingKey> {
        self.check()?;
        Ok(EncodingKey::from_secret(self.secret.as_bytes()))
    }

    pub fn decoding_key(&self) -> Result<DecodingKey> {
        self.check()?;
        Ok(DecodingKey::from_secret(self.secret.as_bytes()))
    }

    pub fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.leeway = self.leeway;

        if let Some(ref iss) = self.issuer {
            validation.set_issuer(&[iss]);
        }

        validation
    }
}
