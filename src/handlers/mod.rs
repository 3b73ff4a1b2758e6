//! HTTP handlers
//!
//! Every handler takes the shared [`AppState`] and the request, and returns
//! `inscribe_core::Result<HttpResponse>`; errors are rendered by the server
//! loop.

pub mod auth;
pub mod blog;
pub mod directory;
pub mod posts;
pub mod site;
pub mod tenant;

use crate::state::AppState;
use inscribe_core::{Error, HttpRequest, Result};
use inscribe_jwt::{JwtError, SessionClaims};
use inscribe_log::debug;
use serde::de::DeserializeOwned;

/// Session of the caller, from the session cookie or a bearer token
pub fn session(state: &AppState, req: &HttpRequest) -> Result<SessionClaims> {
    let token = req
        .cookie(&state.cookie.name)
        .filter(|t| !t.is_empty())
        .or_else(|| req.bearer_token().map(str::to_string))
        .ok_or_else(|| Error::Unauthorized("sign in required".to_string()))?;

    state.jwt.verify_session(&token).map_err(|e| {
        debug!(error = %e, "Rejected session token");
        match e {
            JwtError::TokenExpired => Error::Unauthorized("session expired".to_string()),
            _ => Error::Unauthorized("invalid session".to_string()),
        }
    })
}

/// Parse a JSON body, mapping failures to 400
pub fn body<T: DeserializeOwned>(req: &HttpRequest) -> Result<T> {
    if req.body.is_empty() {
        return Err(Error::BadRequest("request body is required".to_string()));
    }
    req.json()
}

pub(crate) fn session_error(err: JwtError) -> Error {
    Error::Internal(format!("session token: {}", err))
}
