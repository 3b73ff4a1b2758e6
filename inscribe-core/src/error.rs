// Error types for Inscribe HTTP services

use crate::HttpResponse;
use thiserror::Error;

/// Result alias used throughout the HTTP layer
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // 4xx Client Errors
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Gone: {0}")]
    Gone(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Unprocessable Entity: {0}")]
    UnprocessableEntity(String),

    // 5xx Server Errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad Gateway: {0}")]
    BadGateway(String),

    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Gateway Timeout: {0}")]
    GatewayTimeout(String),
}

impl Error {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::RouteNotFound(_) | Error::NotFound(_) => 404,
            Error::MethodNotAllowed(_) => 405,
            Error::Deserialization(_) | Error::BadRequest(_) | Error::Http(_) => 400,
            Error::Validation(_) | Error::UnprocessableEntity(_) => 422,
            Error::Unauthorized(_) => 401,
            Error::Forbidden(_) => 403,
            Error::Conflict(_) => 409,
            Error::Gone(_) => 410,
            Error::PayloadTooLarge(_) => 413,
            Error::BadGateway(_) => 502,
            Error::ServiceUnavailable(_) => 503,
            Error::GatewayTimeout(_) => 504,
            Error::Serialization(_) | Error::Io(_) | Error::Internal(_) => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Message safe to send to a client. Server-side details stay in the logs.
    pub fn public_message(&self) -> String {
        match self.status_code() {
            500 => "Internal server error".to_string(),
            502 => "Upstream provider error".to_string(),
            503 => "Service unavailable".to_string(),
            504 => "Upstream timeout".to_string(),
            _ => self.to_string(),
        }
    }

    /// Render as a `{"error": ..., "status": ...}` JSON response
    pub fn into_response(self) -> HttpResponse {
        let status = self.status_code();
        if self.is_server_error() {
            inscribe_log::error!(status, error = %self, "Request failed");
        }
        let body = serde_json::json!({
            "error": self.public_message(),
            "status": status,
        });
        HttpResponse::new(status)
            .with_json(&body)
            .unwrap_or_else(|_| HttpResponse::internal_server_error())
    }
}
