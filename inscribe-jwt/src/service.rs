// Session token service

use crate::{JwtConfig, JwtError, Result, SessionClaims};
use inscribe_log::debug;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode};
use serde::{Serialize, de::DeserializeOwned};

/// Signs and verifies session tokens
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Result<Self> {
        let encoding_key = config.encoding_key()?;
        let decoding_key = config.decoding_key()?;
        let validation = config.validation();

        Ok(Self {
            config,
            encoding_key,
            decoding_key,
            validation,
        })
    }

    /// Sign a token with claims
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String> {
        let header = Header::new(self.config.algorithm);
        encode(&header, claims, &self.encoding_key).map_err(JwtError::from)
    }

    /// Verify and decode a token
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T> {
        let token_data: TokenData<T> = decode(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                _ => JwtError::InvalidToken(e.to_string()),
            })?;

        Ok(token_data.claims)
    }

    /// Issue a session token for a user of `tenant`
    pub fn issue_session(&self, user_id: &str, tenant: &str, email: &str) -> Result<String> {
        let mut claims = SessionClaims::new(user_id, tenant, email, self.config.expires_in);
        if let Some(iss) = &self.config.issuer {
            claims = claims.with_issuer(iss.clone());
        }
        debug!(user_id, tenant, "Issuing session token");
        self.sign(&claims)
    }

    pub fn verify_session(&self, token: &str) -> Result<SessionClaims> {
        self.verify(token)
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    const SECRET: &str = "test-secret-test-secret-test-secret";

    fn service() -> JwtService {
        JwtService::new(JwtConfig::new(SECRET).with_issuer("inscribe")).unwrap()
    }

    #[test]
    fn test_session_round_trip() {
        let service = service();
        let token = service.issue_session("user-1", "dhaval", "d@example.com").unwrap();
        let claims = service.verify_session(&token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.tenant, "dhaval");
        assert_eq!(claims.iss.as_deref(), Some("inscribe"));
        assert_eq!(claims.exp - claims.iat, 604_800);
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let service = service();
        let token = service.issue_session("user-1", "dhaval", "d@example.com").unwrap();

        // Re-sign the same header over a payload claiming another tenant
        let forged_claims = SessionClaims::new("user-1", "abhinav", "d@example.com", Duration::from_secs(60));
        let other = JwtService::new(JwtConfig::new("another-secret-another-secret-xx")).unwrap();
        let forged = other.sign(&forged_claims).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_parts: Vec<&str> = forged.split('.').collect();
        parts[1] = forged_parts[1];
        let spliced = parts.join(".");

        assert!(matches!(
            service.verify_session(&spliced),
            Err(JwtError::InvalidSignature)
        ));
        assert!(service.verify_session(&forged).is_err());
        assert!(service.verify_session("not-a-token").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = service();
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: "user-1".into(),
            tenant: "dhaval".into(),
            email: "d@example.com".into(),
            iss: Some("inscribe".into()),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = service.sign(&claims).unwrap();
        assert!(matches!(
            service.verify_session(&token),
            Err(JwtError::TokenExpired)
        ));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let service = service();
        let claims = SessionClaims::new("u", "t", "e@example.com", Duration::from_secs(60))
            .with_issuer("someone-else");
        let token = service.sign(&claims).unwrap();
        assert!(service.verify_session(&token).is_err());
    }
}
