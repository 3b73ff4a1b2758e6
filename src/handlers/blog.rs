// Public reader surface, reached through tenant rewrites

use crate::posts;
use crate::state::AppState;
use inscribe_core::{Error, HttpRequest, HttpResponse, Result};
use inscribe_tenancy::{Tenant, TenantContext};
use serde_json::json;
use std::sync::Arc;

/// The tenant named by the `:tenant` segment. Checked against the registry
/// first so unknown names never create a store.
async fn tenant(state: &AppState, req: &HttpRequest) -> Result<Tenant> {
    let name = req
        .param("tenant")
        .ok_or_else(|| Error::NotFound(req.path.clone()))?;
    state
        .registry
        .find_by_subdomain(name)
        .await?
        .ok_or_else(|| Error::NotFound(format!("blog '{}'", name)))
}

/// `GET /:tenant`: published posts, newest first
pub async fn index(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let tenant = tenant(&state, &req).await?;
    let posts = posts::list(&state.storage, &tenant.subdomain, true).await?;

    HttpResponse::json_ok(&json!({
        "blog": {
            "name": tenant.display_name,
            "subdomain": tenant.subdomain,
            "url": tenant.public_url(state.main_domain()),
        },
        "path": TenantContext::from_request(&req).map(|c| c.original_path),
        "posts": posts,
    }))
}

/// `GET /:tenant/blog/:slug`
pub async fn post(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let tenant = tenant(&state, &req).await?;
    let slug = req
        .param("slug")
        .ok_or_else(|| Error::NotFound(req.path.clone()))?;

    let post = posts::find(&state.storage, &tenant.subdomain, slug, true)
        .await?
        .ok_or_else(|| Error::NotFound(format!("post '{}'", slug)))?;

    HttpResponse::json_ok(&json!({
        "blog": {
            "name": tenant.display_name,
            "subdomain": tenant.subdomain,
            "url": tenant.public_url(state.main_domain()),
        },
        "post": post,
    }))
}
