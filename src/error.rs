// Errors raised while assembling the application

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] inscribe_config::ConfigError),

    #[error("Session configuration error: {0}")]
    Session(#[from] inscribe_jwt::JwtError),

    #[error("Provisioner setup failed: {0}")]
    Provisioning(#[from] inscribe_tenancy::ProvisionError),

    #[error("Directory source setup failed: {0}")]
    Directory(#[from] inscribe_tenancy::DirectoryError),

    #[error("Logging setup failed: {0}")]
    Logging(#[from] inscribe_log::LogError),

    #[error("Invalid listen address {0}")]
    Address(String),

    #[error("Server error: {0}")]
    Server(#[from] inscribe_core::Error),
}
