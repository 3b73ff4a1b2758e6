//! Authoritative sources for hostname → tenant mappings

use crate::error::DirectoryError;
use crate::registry::TenantRegistry;
use async_trait::async_trait;
use inscribe_log::debug;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// The system of record the directory cache and resolver consult
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Every linked custom domain mapped to its tenant's subdomain
    async fn fetch_mappings(&self) -> Result<HashMap<String, String>, DirectoryError>;

    /// Custom domain of a single tenant, if it has one
    async fn lookup_custom_domain(&self, subdomain: &str)
    -> Result<Option<String>, DirectoryError>;
}

#[derive(Debug, Deserialize)]
struct MappingsResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: HashMap<String, String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomDomainResponse {
    #[serde(default)]
    custom_domain: Option<String>,
}

/// Reads the directory endpoints of a remote Inscribe deployment
/// (`/api/subdomains` and `/api/get-custom-domain`).
pub struct HttpDirectorySource {
    client: Client,
    base_url: String,
}

impl HttpDirectorySource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DirectoryError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("inscribe/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl DirectorySource for HttpDirectorySource {
    async fn fetch_mappings(&self) -> Result<HashMap<String, String>, DirectoryError> {
        let url = format!("{}/api/subdomains", self.base_url);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Status(status.as_u16()));
        }

        let body: MappingsResponse = response.json().await?;
        if !body.success {
            return Err(DirectoryError::Upstream(
                body.error.unwrap_or_else(|| "success=false".to_string()),
            ));
        }

        debug!(entries = body.data.len(), "Fetched directory mappings");
        Ok(body.data)
    }

    async fn lookup_custom_domain(
        &self,
        subdomain: &str,
    ) -> Result<Option<String>, DirectoryError> {
        let url = format!("{}/api/get-custom-domain", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("subdomain", subdomain)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Status(status.as_u16()));
        }

        let body: CustomDomainResponse = response.json().await?;
        Ok(body.custom_domain.filter(|d| !d.is_empty()))
    }
}

/// Answers from the local registry when this process is itself authoritative
pub struct RegistryDirectorySource {
    registry: Arc<TenantRegistry>,
}

impl RegistryDirectorySource {
    pub fn new(registry: Arc<TenantRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl DirectorySource for RegistryDirectorySource {
    async fn fetch_mappings(&self) -> Result<HashMap<String, String>, DirectoryError> {
        self.registry
            .custom_domain_map()
            .await
            .map_err(|e| DirectoryError::Registry(e.to_string()))
    }

    async fn lookup_custom_domain(
        &self,
        subdomain: &str,
    ) -> Result<Option<String>, DirectoryError> {
        self.registry
            .custom_domain_for(subdomain)
            .await
            .map_err(|e| DirectoryError::Registry(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioner::NoOpProvisioner;
    use crate::storage::{StorageConfig, StorageGateway};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_http_fetch_mappings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/subdomains"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "abhinav.dev": "abhinav", "notes.example.org": "dhaval" },
            })))
            .mount(&server)
            .await;

        let source = HttpDirectorySource::new(server.uri(), Duration::from_secs(2)).unwrap();
        let mappings = source.fetch_mappings().await.unwrap();
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings["abhinav.dev"], "abhinav");
    }

    #[tokio::test]
    async fn test_http_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/subdomains"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "success": false, "data": {} })),
            )
            .mount(&server)
            .await;

        let source = HttpDirectorySource::new(server.uri(), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            source.fetch_mappings().await,
            Err(DirectoryError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpDirectorySource::new(server.uri(), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            source.lookup_custom_domain("abhinav").await,
            Err(DirectoryError::Status(503))
        ));
    }

    #[tokio::test]
    async fn test_http_lookup_custom_domain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/get-custom-domain"))
            .and(query_param("subdomain", "abhinav"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "customDomain": "abhinav.dev" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/get-custom-domain"))
            .and(query_param("subdomain", "dhaval"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "customDomain": null })))
            .mount(&server)
            .await;

        let source = HttpDirectorySource::new(server.uri(), Duration::from_secs(2)).unwrap();
        assert_eq!(
            source.lookup_custom_domain("abhinav").await.unwrap().as_deref(),
            Some("abhinav.dev")
        );
        assert_eq!(source.lookup_custom_domain("dhaval").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_registry_source() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(StorageGateway::new(StorageConfig::new(dir.path())));
        let registry = Arc::new(TenantRegistry::new(
            storage,
            "inscribe.so",
            Arc::new(NoOpProvisioner),
        ));
        registry.create_tenant("abhinav", "A").await.unwrap();
        registry
            .attach_custom_domain("abhinav", "abhinav.dev")
            .await
            .unwrap();

        let source = RegistryDirectorySource::new(registry);
        let mappings = source.fetch_mappings().await.unwrap();
        assert_eq!(mappings.get("abhinav.dev").map(String::as_str), Some("abhinav"));
        assert_eq!(
            source.lookup_custom_domain("abhinav").await.unwrap().as_deref(),
            Some("abhinav.dev")
        );
        assert_eq!(source.lookup_custom_domain("nobody").await.unwrap(), None);
    }
}
