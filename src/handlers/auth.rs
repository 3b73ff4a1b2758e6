// Registration, login and password reset

use super::{body, session_error};
use crate::state::AppState;
use inscribe_core::{Error, HttpRequest, HttpResponse, Result};
use inscribe_log::{info, warn};
use inscribe_tenancy::{Tenant, User};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    subdomain: String,
    #[serde(default)]
    display_name: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct ResetRequest {
    email: String,
}

#[derive(Debug, Deserialize)]
struct ResetConfirmRequest {
    token: String,
    password: String,
}

/// Response carrying a fresh session, as a cookie and in the body
fn signed_in(state: &AppState, status: u16, tenant: &Tenant, user: &User) -> Result<HttpResponse> {
    let token = state
        .jwt
        .issue_session(&user.id, &tenant.subdomain, &user.email)
        .map_err(session_error)?;

    HttpResponse::new(status)
        .with_header("Set-Cookie", state.cookie.build(&token))
        .with_json(&json!({
            "tenant": tenant,
            "user": user,
            "url": tenant.public_url(state.main_domain()),
            "token": token,
        }))
}

/// `POST /api/auth/register`: new tenant plus its owner
pub async fn register(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let input: RegisterRequest = body(&req)?;
    let (tenant, user) = state
        .registry
        .register_owner(&input.subdomain, &input.display_name, &input.email, &input.password)
        .await?;

    signed_in(&state, 201, &tenant, &user)
}

/// `POST /api/auth/login`
pub async fn login(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let input: LoginRequest = body(&req)?;
    let user = state
        .registry
        .verify_credentials(&input.email, &input.password)
        .await?;
    let tenant = state
        .registry
        .find_by_id(&user.tenant_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("user {} has no tenant", user.id)))?;

    info!(user = %user.id, tenant = %tenant.subdomain, "Signed in");
    signed_in(&state, 200, &tenant, &user)
}

/// `POST /api/auth/logout`
pub async fn logout(state: Arc<AppState>, _req: HttpRequest) -> Result<HttpResponse> {
    Ok(HttpResponse::no_content().with_header("Set-Cookie", state.cookie.clear()))
}

/// `POST /api/auth/password-reset`
///
/// The token only ever leaves through the state's
/// [`ResetNotifier`](inscribe_tenancy::ResetNotifier). Every address, known or
/// not, gets the same `{"success": true}`.
pub async fn request_reset(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let input: ResetRequest = body(&req)?;
    if let Some(user) = state.registry.find_user_by_email(&input.email).await? {
        let token = state.registry.create_reset_token(&user.id).await?;
        if let Err(err) = state.notifier.send_reset(&user, &token).await {
            warn!(user = %user.id, error = %err, "Reset token delivery failed");
        }
    }

    HttpResponse::json_ok(&json!({ "success": true }))
}

/// `POST /api/auth/password-reset/confirm`
pub async fn confirm_reset(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let input: ResetConfirmRequest = body(&req)?;
    state
        .registry
        .reset_password(&input.token, &input.password)
        .await?;

    HttpResponse::json_ok(&json!({ "success": true }))
}
