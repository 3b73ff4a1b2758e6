//! Error types for tenancy operations

use thiserror::Error;

/// Tenant registry and resolution errors
#[derive(Debug, Error)]
pub enum TenantError {
    #[error("Tenant not found: {0}")]
    NotFound(String),

    #[error("Invalid tenant identifier: {0}")]
    Invalid(String),

    #[error("Subdomain is reserved: {0}")]
    Reserved(String),

    #[error("Already taken: {0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    Unauthorized,

    #[error("Domain provisioning failed: {0}")]
    Provisioning(#[from] ProvisionError),

    #[error("Password hashing failed: {0}")]
    Password(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Per-tenant storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid store name: {0}")]
    InvalidTenant(String),

    #[error("Failed to open store {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("SQL error: {0}")]
    Sql(sqlx::Error),

    #[error("Statement {index} failed, transaction rolled back: {source}")]
    Statement {
        index: usize,
        #[source]
        source: Box<StorageError>,
    },

    #[error("Failed to decode column {column}: {reason}")]
    Decode { column: String, reason: String },
}

impl StorageError {
    /// Whether this error (or the statement error it wraps) is a uniqueness
    /// or check constraint violation
    pub fn is_constraint(&self) -> bool {
        match self {
            StorageError::Constraint(_) => true,
            StorageError::Statement { source, .. } => source.is_constraint(),
            _ => false,
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() || db_err.is_check_violation() {
                return StorageError::Constraint(db_err.message().to_string());
            }
        }
        StorageError::Sql(err)
    }
}

/// Authoritative directory errors
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Directory request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Directory returned status {0}")]
    Status(u16),

    #[error("Directory lookup timed out")]
    Timeout,

    #[error("Directory reported failure: {0}")]
    Upstream(String),

    #[error("Directory registry error: {0}")]
    Registry(String),
}

/// DNS provider errors
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider rejected {domain} (status {status}): {message}")]
    Rejected {
        domain: String,
        status: u16,
        message: String,
    },

    #[error("Provider configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TenantError>;

impl From<TenantError> for inscribe_core::Error {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::NotFound(msg) => inscribe_core::Error::NotFound(msg),
            TenantError::Invalid(_) | TenantError::Reserved(_) => {
                inscribe_core::Error::BadRequest(err.to_string())
            }
            TenantError::Conflict(_) => inscribe_core::Error::Conflict(err.to_string()),
            TenantError::Unauthorized => inscribe_core::Error::Unauthorized(err.to_string()),
            TenantError::Provisioning(e) => inscribe_core::Error::BadGateway(e.to_string()),
            TenantError::Password(msg) => inscribe_core::Error::Internal(msg),
            TenantError::Storage(e) => e.into(),
        }
    }
}

impl From<StorageError> for inscribe_core::Error {
    fn from(err: StorageError) -> Self {
        match err {
            e if e.is_constraint() => inscribe_core::Error::Conflict(e.to_string()),
            StorageError::InvalidTenant(name) => {
                inscribe_core::Error::BadRequest(format!("Invalid tenant: {}", name))
            }
            e => inscribe_core::Error::Internal(e.to_string()),
        }
    }
}
