//! Authoritative directory endpoints, consumed by edge deployments through
//! `HttpDirectorySource`

use crate::state::AppState;
use inscribe_core::{Error, HttpRequest, HttpResponse, Result};
use serde_json::json;
use std::sync::Arc;

/// `GET /api/subdomains` → `{success, data: {customDomain: subdomain}}`
pub async fn subdomains(state: Arc<AppState>, _req: HttpRequest) -> Result<HttpResponse> {
    let data = state.registry.custom_domain_map().await?;
    HttpResponse::json_ok(&json!({ "success": true, "data": data }))
}

/// `GET /api/get-custom-domain?subdomain=<label>` → `{customDomain}`
pub async fn custom_domain(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let subdomain = req
        .query("subdomain")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::BadRequest("subdomain query parameter is required".to_string()))?;

    let domain = state.registry.custom_domain_for(subdomain).await?;
    HttpResponse::json_ok(&json!({ "customDomain": domain }))
}
