// The signed-in owner's tenant

use super::{body, session};
use crate::state::AppState;
use inscribe_core::{Error, HttpRequest, HttpResponse, Result};
use inscribe_tenancy::Tenant;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct DomainRequest {
    domain: String,
}

pub(crate) async fn current_tenant(state: &AppState, req: &HttpRequest) -> Result<Tenant> {
    let claims = session(state, req)?;
    state
        .registry
        .find_by_subdomain(&claims.tenant)
        .await?
        .ok_or_else(|| Error::NotFound(format!("tenant {}", claims.tenant)))
}

/// `GET /api/tenant`
pub async fn show(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let tenant = current_tenant(&state, &req).await?;
    HttpResponse::json_ok(&json!({
        "url": tenant.public_url(state.main_domain()),
        "tenant": tenant,
    }))
}

/// `POST /api/tenant/domain`: link a custom domain
pub async fn attach_domain(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let tenant = current_tenant(&state, &req).await?;
    let input: DomainRequest = body(&req)?;

    let tenant = state
        .registry
        .attach_custom_domain(&tenant.subdomain, &input.domain)
        .await?;

    // Serve the new domain from this process without waiting for the next refresh
    let _ = state.cache.refresh().await;

    HttpResponse::json_ok(&json!({
        "url": tenant.public_url(state.main_domain()),
        "tenant": tenant,
    }))
}
