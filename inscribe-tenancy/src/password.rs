// Password hashing and verification

use crate::error::TenantError;
use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString, rand_core::OsRng,
    },
};

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Argon2id password hasher producing PHC strings
#[derive(Clone, Default)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash(&self, password: &str) -> Result<String, TenantError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(TenantError::Invalid(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| TenantError::Password(e.to_string()))?;

        Ok(password_hash.to_string())
    }

    /// `Ok(false)` on mismatch; `Err` only when `hash` is not a PHC string
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, TenantError> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| TenantError::Password(e.to_string()))?;

        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}
