//! Custom domain provisioning with the DNS provider

use crate::error::ProvisionError;
use async_trait::async_trait;
use inscribe_log::{info, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

/// Registers a custom domain with the edge/DNS provider
#[async_trait]
pub trait DomainProvisioner: Send + Sync {
    /// Register `domain`, returning the provider's metadata for it
    async fn register(&self, domain: &str) -> Result<Value, ProvisionError>;
}

/// Provisioner for deployments without a DNS provider
pub struct NoOpProvisioner;

#[async_trait]
impl DomainProvisioner for NoOpProvisioner {
    async fn register(&self, domain: &str) -> Result<Value, ProvisionError> {
        info!(domain, "Skipping DNS provisioning");
        Ok(json!({ "status": "skipped" }))
    }
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ZoneResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    errors: Vec<ProviderError>,
}

/// Creates a full DNS zone per custom domain through the provider's
/// `POST /zones` API
pub struct ZoneApiProvisioner {
    client: Client,
    api_base: String,
    api_token: String,
    account_id: String,
}

impl ZoneApiProvisioner {
    pub fn new(
        api_base: impl Into<String>,
        api_token: impl Into<String>,
        account_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProvisionError> {
        let api_token = api_token.into();
        let account_id = account_id.into();
        if api_token.is_empty() || account_id.is_empty() {
            return Err(ProvisionError::Config(
                "api token and account id are required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .user_agent(concat!("inscribe/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_token,
            account_id,
        })
    }
}

#[async_trait]
impl DomainProvisioner for ZoneApiProvisioner {
    async fn register(&self, domain: &str) -> Result<Value, ProvisionError> {
        let url = format!("{}/zones", self.api_base);
        let body = json!({
            "name": domain,
            "account": { "id": self.account_id },
            "type": "full",
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let parsed: Option<ZoneResponse> = response.json().await.ok();

        match parsed {
            Some(zone) if status.is_success() && zone.success => {
                info!(domain, "Registered DNS zone");
                Ok(zone.result)
            }
            other => {
                let message = other
                    .and_then(|z| z.errors.into_iter().next())
                    .map(|e| format!("{} (code {})", e.message, e.code))
                    .unwrap_or_else(|| "unexpected provider response".to_string());
                warn!(domain, status = status.as_u16(), error = %message, "DNS zone registration failed");
                Err(ProvisionError::Rejected {
                    domain: domain.to_string(),
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_noop_provisioner() {
        let metadata = NoOpProvisioner.register("abhinav.dev").await.unwrap();
        assert_eq!(metadata["status"], "skipped");
    }

    #[tokio::test]
    async fn test_zone_registration() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/zones"))
            .and(header("authorization", "Bearer secret-token"))
            .and(body_json(json!({
                "name": "abhinav.dev",
                "account": { "id": "acct-1" },
                "type": "full",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "errors": [],
                "result": { "id": "zone-123", "name_servers": ["a.ns.example", "b.ns.example"] },
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provisioner =
            ZoneApiProvisioner::new(server.uri(), "secret-token", "acct-1", Duration::from_secs(2))
                .unwrap();
        let metadata = provisioner.register("abhinav.dev").await.unwrap();
        assert_eq!(metadata["id"], "zone-123");
    }

    #[tokio::test]
    async fn test_zone_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/zones"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "success": false,
                "errors": [{ "code": 1061, "message": "zone already exists" }],
                "result": null,
            })))
            .mount(&server)
            .await;

        let provisioner =
            ZoneApiProvisioner::new(server.uri(), "t", "a", Duration::from_secs(2)).unwrap();
        let err = provisioner.register("taken.dev").await.unwrap_err();
        match err {
            ProvisionError::Rejected { status, message, .. } => {
                assert_eq!(status, 400);
                assert!(message.contains("zone already exists"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_requires_credentials() {
        assert!(ZoneApiProvisioner::new("https://api.example", "", "acct", Duration::from_secs(1)).is_err());
    }
}
