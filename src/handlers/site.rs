// Landing page and liveness

use crate::state::AppState;
use inscribe_core::{HttpRequest, HttpResponse, Result};
use serde_json::json;
use std::sync::Arc;

pub async fn landing(state: Arc<AppState>, _req: HttpRequest) -> Result<HttpResponse> {
    HttpResponse::json_ok(&json!({
        "name": "Inscribe",
        "tagline": "Your own blog, on your own domain.",
        "signup": format!("https://{}/signup", state.main_domain()),
    }))
}

pub async fn health(state: Arc<AppState>, _req: HttpRequest) -> Result<HttpResponse> {
    HttpResponse::json_ok(&json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "directoryEntries": state.cache.len(),
        "openStores": state.storage.open_stores(),
    }))
}
