//! Hostname classification

use crate::directory::DirectoryCache;
use crate::error::DirectoryError;
use crate::source::DirectorySource;
use crate::tenant::{is_reserved, is_valid_label, normalize_host};
use inscribe_log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

/// Default bound on an authoritative single-tenant lookup
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(300);

/// What a request's hostname refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostClass {
    /// The platform's own domain (landing page, auth pages, API)
    Main,
    /// `<tenant>.<main domain>`
    Subdomain(String),
    /// A linked custom domain found in the directory cache
    CustomDomain(String),
    Unknown,
}

impl HostClass {
    /// Tenant subdomain the request should be served from, if any
    pub fn tenant(&self) -> Option<&str> {
        match self {
            HostClass::Subdomain(t) | HostClass::CustomDomain(t) => Some(t),
            HostClass::Main | HostClass::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub class: HostClass,
    /// `https://<custom domain><path>` when the tenant must be served from its
    /// custom domain instead
    pub redirect: Option<String>,
}

impl Resolution {
    fn of(class: HostClass) -> Self {
        Self {
            class,
            redirect: None,
        }
    }

    fn redirect(class: HostClass, domain: &str, path: &str) -> Self {
        Self {
            class,
            redirect: Some(format!("https://{}{}", domain, path)),
        }
    }
}

pub struct HostResolver {
    main_domain: String,
    www_domain: String,
    cache: Arc<DirectoryCache>,
    source: Arc<dyn DirectorySource>,
    lookup_timeout: Duration,
}

impl HostResolver {
    pub fn new(
        main_domain: impl Into<String>,
        cache: Arc<DirectoryCache>,
        source: Arc<dyn DirectorySource>,
    ) -> Self {
        let main_domain = normalize_host(&main_domain.into());
        Self {
            www_domain: format!("www.{}", main_domain),
            main_domain,
            cache,
            source,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn main_domain(&self) -> &str {
        &self.main_domain
    }

    pub fn cache(&self) -> &Arc<DirectoryCache> {
        &self.cache
    }

    /// Classify a request by hostname, computing a redirect when the tenant it
    /// addresses has a custom domain.
    ///
    /// Lookup failures and timeouts never surface; the request is classified
    /// [`HostClass::Unknown`].
    pub async fn classify(&self, host: &str, path: &str) -> Resolution {
        let host = normalize_host(host);
        if host.is_empty() {
            return Resolution::of(HostClass::Unknown);
        }

        if host == self.main_domain || host == self.www_domain {
            return self.classify_main(path).await;
        }

        if let Some(label) = host
            .strip_suffix(self.main_domain.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
        {
            return self.classify_subdomain(label, path).await;
        }

        match self.cache.resolve(&host).await {
            Some(tenant) => Resolution::of(HostClass::CustomDomain(tenant)),
            None => Resolution::of(HostClass::Unknown),
        }
    }

    /// `/<tenant>/...` on the main domain redirects to the tenant's custom
    /// domain when it has one
    async fn classify_main(&self, path: &str) -> Resolution {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let (segment, rest) = match trimmed.find('/') {
            Some(idx) => (&trimmed[..idx], &trimmed[idx..]),
            None => (trimmed, ""),
        };
        let segment = segment.to_ascii_lowercase();

        if !is_valid_label(&segment) || is_reserved(&segment) {
            return Resolution::of(HostClass::Main);
        }

        match self.lookup(&segment).await {
            Ok(Some(domain)) => {
                let rest = if rest.is_empty() { "/" } else { rest };
                Resolution::redirect(HostClass::Main, &domain, rest)
            }
            Ok(None) => Resolution::of(HostClass::Main),
            Err(_) => Resolution::of(HostClass::Unknown),
        }
    }

    async fn classify_subdomain(&self, label: &str, path: &str) -> Resolution {
        if label.contains('.') || !is_valid_label(label) || is_reserved(label) {
            debug!(label, "Not a tenant subdomain");
            return Resolution::of(HostClass::Unknown);
        }

        let class = HostClass::Subdomain(label.to_string());
        match self.lookup(label).await {
            Ok(Some(domain)) => Resolution::redirect(class, &domain, path),
            Ok(None) => Resolution::of(class),
            Err(_) => Resolution::of(HostClass::Unknown),
        }
    }

    async fn lookup(&self, tenant: &str) -> Result<Option<String>, DirectoryError> {
        let outcome = tokio::time::timeout(
            self.lookup_timeout,
            self.source.lookup_custom_domain(tenant),
        )
        .await
        .map_err(|_| DirectoryError::Timeout)
        .and_then(|r| r);

        if let Err(err) = &outcome {
            warn!(tenant, error = %err, "Custom domain lookup failed");
        }
        outcome.map(|domain| domain.map(|d| normalize_host(&d)).filter(|d| !d.is_empty()))
    }
}
