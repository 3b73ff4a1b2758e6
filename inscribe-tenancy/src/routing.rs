//! Edge routing middleware
//!
//! Decides per request whether to pass it through, rewrite its path into the
//! tenant's namespace (`/<tenant><path>`), or redirect it permanently to the
//! tenant's custom domain.

use crate::resolver::{HostClass, HostResolver};
use crate::tenant::{ORIGINAL_PATH_HEADER, TENANT_HEADER};
use async_trait::async_trait;
use inscribe_core::{Error, HttpRequest, HttpResponse, Middleware, Next};
use inscribe_log::{debug, trace};
use std::sync::Arc;

/// `Cache-Control` sent with custom-domain redirects
pub const REDIRECT_CACHE_CONTROL: &str = "public, max-age=31536000";

/// Path prefixes never subject to tenant routing
pub const DEFAULT_BYPASS_PREFIXES: &[&str] = &[
    "/_next",
    "/_static",
    "/api",
    "/admin",
    "/login",
    "/signup",
    "/reset-password",
];

/// Paths that skip tenant routing entirely
#[derive(Debug, Clone)]
pub struct BypassRules {
    prefixes: Vec<String>,
}

impl Default for BypassRules {
    fn default() -> Self {
        Self {
            prefixes: DEFAULT_BYPASS_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl BypassRules {
    /// Prefixes match whole segments: `/api` covers `/api` and `/api/x`,
    /// not `/apiary`. A dot in the last segment marks a static file.
    ///
    /// ```
    /// use inscribe_tenancy::BypassRules;
    ///
    /// let rules = BypassRules::default();
    /// assert!(rules.matches("/api/subdomains"));
    /// assert!(rules.matches("/blog/cover.png"));
    /// assert!(!rules.matches("/apiary"));
    /// assert!(!rules.matches("/blog/my-post"));
    /// ```
    pub fn matches(&self, path: &str) -> bool {
        let by_prefix = self.prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        });
        if by_prefix {
            return true;
        }

        path.rsplit('/').next().is_some_and(|last| last.contains('.'))
    }
}

/// Outcome of routing one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    PassThrough,
    Rewrite { tenant: String, path: String },
    Redirect { location: String },
}

/// `/<tenant><path>`, unless `path` is already in the tenant's namespace
///
/// ```
/// use inscribe_tenancy::rewrite_path;
///
/// assert_eq!(rewrite_path("dhaval", "/"), "/dhaval/");
/// assert_eq!(rewrite_path("dhaval", "/blog/x"), "/dhaval/blog/x");
/// assert_eq!(rewrite_path("dhaval", "/dhaval/blog/x"), "/dhaval/blog/x");
/// ```
pub fn rewrite_path(tenant: &str, path: &str) -> String {
    let already = path
        .strip_prefix('/')
        .and_then(|p| p.strip_prefix(tenant))
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
    if already {
        return path.to_string();
    }

    if path.starts_with('/') {
        format!("/{}{}", tenant, path)
    } else {
        format!("/{}/{}", tenant, path)
    }
}

/// Host-based tenant routing
pub struct TenantRoutingMiddleware {
    resolver: Arc<HostResolver>,
    bypass: BypassRules,
}

impl TenantRoutingMiddleware {
    pub fn new(resolver: Arc<HostResolver>) -> Self {
        Self {
            resolver,
            bypass: BypassRules::default(),
        }
    }

    /// Route a request without running any handler
    pub async fn decide(&self, host: &str, path: &str, query: Option<&str>) -> RouteDecision {
        if self.bypass.matches(path) {
            trace!(path, "Bypassing tenant routing");
            return RouteDecision::PassThrough;
        }

        let resolution = self.resolver.classify(host, path).await;

        if let Some(mut location) = resolution.redirect {
            if let Some(q) = query.filter(|q| !q.is_empty()) {
                location.push('?');
                location.push_str(q);
            }
            return RouteDecision::Redirect { location };
        }

        match resolution.class {
            HostClass::Subdomain(tenant) | HostClass::CustomDomain(tenant) => {
                let path = rewrite_path(&tenant, path);
                RouteDecision::Rewrite { tenant, path }
            }
            HostClass::Main | HostClass::Unknown => RouteDecision::PassThrough,
        }
    }
}

#[async_trait]
impl Middleware for TenantRoutingMiddleware {
    async fn handle(&self, mut req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        // Only this middleware may set the internal headers
        req.remove_header(TENANT_HEADER);
        req.remove_header(ORIGINAL_PATH_HEADER);

        let host = req.host().unwrap_or_default().to_string();
        let decision = self
            .decide(&host, &req.path, req.query_string.as_deref())
            .await;

        match decision {
            RouteDecision::PassThrough => next(req).await,
            RouteDecision::Redirect { location } => {
                debug!(host = %host, path = %req.path, location = %location, "Redirecting to custom domain");
                Ok(HttpResponse::moved_permanently(location)
                    .with_header("Cache-Control", REDIRECT_CACHE_CONTROL))
            }
            RouteDecision::Rewrite { tenant, path } => {
                debug!(host = %host, from = %req.path, to = %path, "Rewriting to tenant");
                let original = std::mem::replace(&mut req.path, path);
                req.set_header(TENANT_HEADER, tenant);
                req.set_header(ORIGINAL_PATH_HEADER, original);
                next(req).await
            }
        }
    }
}
