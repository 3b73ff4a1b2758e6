// Authoring API over the signed-in owner's store

use super::{body, session};
use crate::posts::{self, PostInput, PostPatch, PostStatus};
use crate::state::AppState;
use chrono::Utc;
use inscribe_core::{Error, HttpRequest, HttpResponse, Result};
use inscribe_log::info;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Upper bound on one import batch
const MAX_IMPORT_RECORDS: usize = 1000;

#[derive(Debug, Deserialize)]
struct ImportRequest {
    posts: Vec<PostInput>,
}

fn slug_param(req: &HttpRequest) -> Result<&str> {
    req.param("slug")
        .map(String::as_str)
        .ok_or_else(|| Error::BadRequest("missing slug".to_string()))
}

fn not_found(slug: &str) -> Error {
    Error::NotFound(format!("post '{}'", slug))
}

/// `GET /api/posts`
pub async fn list(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let claims = session(&state, &req)?;
    let posts = posts::list(&state.storage, &claims.tenant, false).await?;
    HttpResponse::json_ok(&json!({ "posts": posts }))
}

/// `POST /api/posts`
pub async fn create(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let claims = session(&state, &req)?;
    let input: PostInput = body(&req)?;
    let post = posts::create(&state.storage, &claims.tenant, &input).await?;
    HttpResponse::created().with_json(&post)
}

/// `GET /api/posts/:slug`
pub async fn show(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let claims = session(&state, &req)?;
    let slug = slug_param(&req)?;
    let post = posts::find(&state.storage, &claims.tenant, slug, false)
        .await?
        .ok_or_else(|| not_found(slug))?;
    HttpResponse::json_ok(&post)
}

/// `PUT /api/posts/:slug`
pub async fn update(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let claims = session(&state, &req)?;
    let slug = slug_param(&req)?;
    let patch: PostPatch = body(&req)?;
    let post = posts::update(&state.storage, &claims.tenant, slug, &patch)
        .await?
        .ok_or_else(|| not_found(slug))?;
    HttpResponse::json_ok(&post)
}

/// `DELETE /api/posts/:slug`
pub async fn delete(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let claims = session(&state, &req)?;
    let slug = slug_param(&req)?;
    if !posts::delete(&state.storage, &claims.tenant, slug).await? {
        return Err(not_found(slug));
    }
    Ok(HttpResponse::no_content())
}

async fn change_status(state: &AppState, req: &HttpRequest, status: PostStatus) -> Result<HttpResponse> {
    let claims = session(state, req)?;
    let slug = slug_param(req)?;
    let post = posts::set_status(&state.storage, &claims.tenant, slug, status)
        .await?
        .ok_or_else(|| not_found(slug))?;
    HttpResponse::json_ok(&post)
}

/// `POST /api/posts/:slug/publish`
pub async fn publish(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    change_status(&state, &req, PostStatus::Published).await
}

/// `POST /api/posts/:slug/unpublish`
pub async fn unpublish(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    change_status(&state, &req, PostStatus::Draft).await
}

/// `POST /api/import`: all posts or none
pub async fn import(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let claims = session(&state, &req)?;
    let input: ImportRequest = body(&req)?;
    if input.posts.is_empty() {
        return Err(Error::BadRequest("no posts to import".to_string()));
    }
    if input.posts.len() > MAX_IMPORT_RECORDS {
        return Err(Error::PayloadTooLarge(format!(
            "at most {} posts per import",
            MAX_IMPORT_RECORDS
        )));
    }

    let imported = posts::import(&state.storage, &claims.tenant, &input.posts).await?;
    info!(tenant = %claims.tenant, imported, "Imported posts");
    HttpResponse::created().with_json(&json!({ "success": true, "imported": imported }))
}

/// `GET /api/export`
pub async fn export(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let claims = session(&state, &req)?;
    let posts = posts::list(&state.storage, &claims.tenant, false).await?;
    let response = HttpResponse::json_ok(&json!({
        "tenant": claims.tenant,
        "exportedAt": Utc::now().to_rfc3339(),
        "posts": posts,
    }))?;
    Ok(response.with_header(
        "Content-Disposition",
        format!("attachment; filename=\"{}-export.json\"", claims.tenant),
    ))
}
