// Session claims

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// User id
    pub sub: String,

    /// Subdomain label of the tenant the user owns
    pub tenant: String,

    pub email: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    pub iat: i64,

    pub exp: i64,
}

impl SessionClaims {
    /// Claims issued now, expiring after `ttl`
    pub fn new(
        user_id: impl Into<String>,
        tenant: impl Into<String>,
        email: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id.into(),
            tenant: tenant.into(),
            email: email.into(),
            iss: None,
            iat: now,
            exp: now + ttl.as_secs() as i64,
        }
    }

    pub fn with_issuer(mut self, iss: impl Into<String>) -> Self {
        self.iss = Some(iss.into());
        self
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Seconds until expiry, zero once expired
    pub fn remaining_secs(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(0)
    }
}
