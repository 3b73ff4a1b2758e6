//! # Inscribe
//!
//! Multi-tenant blogging platform. Each registered owner gets
//! `<subdomain>.<main domain>`, optionally a linked custom domain, and an
//! isolated SQLite store for their posts.
//!
//! This crate wires the workspace together: [`AppState`] holds the shared
//! services, [`build_router`] declares the route table and
//! [`build_application`] assembles the middleware chain around it.
//!
//! ```no_run
//! use inscribe::{AppState, build_application};
//! use inscribe_config::PlatformSettings;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = PlatformSettings::load(None)?;
//! let state = AppState::from_settings(settings)?;
//! build_application(state).listen("0.0.0.0:3000".parse()?).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod handlers;
pub mod posts;
pub mod state;

pub use error::StartupError;
pub use state::AppState;

use handlers::{auth, blog, directory, posts as post_handlers, site, tenant};
use inscribe_core::{
    Application, BodySizeLimitMiddleware, HttpRequest, HttpResponse, LoggingMiddleware,
    MiddlewareChain, RequestIdMiddleware, Result, Router,
};
use inscribe_tenancy::TenantRoutingMiddleware;
use std::future::Future;
use std::sync::Arc;

/// Adapt a `(state, request)` handler to the router's `request`-only shape
fn with_state<F, Fut>(
    state: &Arc<AppState>,
    handler: F,
) -> impl Fn(HttpRequest) -> Fut + Send + Sync + 'static
where
    F: Fn(Arc<AppState>, HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
{
    let state = Arc::clone(state);
    move |req| handler(Arc::clone(&state), req)
}

/// The route table. API routes come first; the reader routes catch
/// rewritten `/<tenant>/...` paths.
pub fn build_router(state: &Arc<AppState>) -> Router {
    let mut router = Router::new();

    router.get("/", with_state(state, site::landing));
    router.get("/api/health", with_state(state, site::health));

    // Directory
    router.get("/api/subdomains", with_state(state, directory::subdomains));
    router.get("/api/get-custom-domain", with_state(state, directory::custom_domain));

    // Auth
    router.post("/api/auth/register", with_state(state, auth::register));
    router.post("/api/auth/login", with_state(state, auth::login));
    router.post("/api/auth/logout", with_state(state, auth::logout));
    router.post("/api/auth/password-reset", with_state(state, auth::request_reset));
    router.post(
        "/api/auth/password-reset/confirm",
        with_state(state, auth::confirm_reset),
    );

    // Tenant
    router.get("/api/tenant", with_state(state, tenant::show));
    router.post("/api/tenant/domain", with_state(state, tenant::attach_domain));

    // Authoring
    router.get("/api/posts", with_state(state, post_handlers::list));
    router.post("/api/posts", with_state(state, post_handlers::create));
    router.get("/api/posts/:slug", with_state(state, post_handlers::show));
    router.put("/api/posts/:slug", with_state(state, post_handlers::update));
    router.delete("/api/posts/:slug", with_state(state, post_handlers::delete));
    router.post("/api/posts/:slug/publish", with_state(state, post_handlers::publish));
    router.post("/api/posts/:slug/unpublish", with_state(state, post_handlers::unpublish));
    router.post("/api/import", with_state(state, post_handlers::import));
    router.get("/api/export", with_state(state, post_handlers::export));

    // Reader
    router.get("/:tenant", with_state(state, blog::index));
    router.get("/:tenant/blog/:slug", with_state(state, blog::post));

    router
}

/// Middleware order: request id, logging, body limit, tenant routing
pub fn build_chain(state: &AppState) -> MiddlewareChain {
    let mut chain = MiddlewareChain::new();
    chain.use_middleware(RequestIdMiddleware);
    chain.use_middleware(LoggingMiddleware::new());
    chain.use_middleware(BodySizeLimitMiddleware::new(
        state.settings.server.max_body_bytes,
    ));
    chain.use_middleware(TenantRoutingMiddleware::new(Arc::clone(&state.resolver)));
    chain
}

pub fn build_application(state: Arc<AppState>) -> Application {
    let router = build_router(&state);
    let chain = build_chain(&state);
    Application::new(router, chain).with_max_body_bytes(state.settings.server.max_body_bytes)
}
