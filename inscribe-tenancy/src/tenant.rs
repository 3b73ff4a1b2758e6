//! Tenant model, hostname normalization and label rules

use crate::error::TenantError;
use chrono::{DateTime, Utc};
use inscribe_core::HttpRequest;
use serde::{Deserialize, Serialize};

/// Subdomain labels that can never be registered. `blog` is the literal
/// segment of reader paths, so a tenant of that name could never be routed.
pub const RESERVED_SUBDOMAINS: &[&str] = &[
    "www", "api", "admin", "app", "login", "signup", "static", "assets", "mail", "blog",
];

/// Internal header carrying the resolved tenant on rewritten requests
pub const TENANT_HEADER: &str = "x-inscribe-tenant";

/// Internal header carrying the client-visible path on rewritten requests
pub const ORIGINAL_PATH_HEADER: &str = "x-inscribe-original-path";

/// A registered blog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: String,

    /// Unique subdomain label, also the name of the tenant's store
    pub subdomain: String,

    pub custom_domain: Option<String>,

    pub display_name: String,

    pub created_at: DateTime<Utc>,

    /// Payload the DNS provider returned when the custom domain was registered
    pub provider_metadata: Option<serde_json::Value>,
}

impl Tenant {
    /// Public URL of the blog's root
    ///
    /// ```
    /// use inscribe_tenancy::Tenant;
    ///
    /// let mut tenant = Tenant::new("dhaval", "Dhaval's notes");
    /// assert_eq!(tenant.public_url("inscribe.so"), "https://dhaval.inscribe.so");
    /// tenant.custom_domain = Some("dhaval.dev".into());
    /// assert_eq!(tenant.public_url("inscribe.so"), "https://dhaval.dev");
    /// ```
    pub fn public_url(&self, main_domain: &str) -> String {
        match &self.custom_domain {
            Some(domain) => format!("https://{}", domain),
            None => format!("https://{}.{}", self.subdomain, main_domain),
        }
    }

    pub fn new(subdomain: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            subdomain: subdomain.into(),
            custom_domain: None,
            display_name: display_name.into(),
            created_at: Utc::now(),
            provider_metadata: None,
        }
    }
}

/// Tenant attached to a request by the routing middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub subdomain: String,
    /// Path as the client sent it, before the rewrite
    pub original_path: String,
}

impl TenantContext {
    pub fn from_request(req: &HttpRequest) -> Option<Self> {
        let subdomain = req.header(TENANT_HEADER)?.to_string();
        let original_path = req
            .header(ORIGINAL_PATH_HEADER)
            .map(str::to_string)
            .unwrap_or_else(|| req.path.clone());
        Some(Self {
            subdomain,
            original_path,
        })
    }
}

/// Lowercase, strip the port and any trailing dot.
///
/// ```
/// use inscribe_tenancy::tenant::normalize_host;
///
/// assert_eq!(normalize_host("Dhaval.Inscribe.so:443"), "dhaval.inscribe.so");
/// assert_eq!(normalize_host("abhinav.dev."), "abhinav.dev");
/// assert_eq!(normalize_host("[::1]:3000"), "[::1]");
/// ```
pub fn normalize_host(raw: &str) -> String {
    let host = raw.trim();
    let host = if host.starts_with('[') {
        // IPv6 literal, port follows the closing bracket
        match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        }
    } else {
        host.split(':').next().unwrap_or(host)
    };
    host.trim_end_matches('.').to_ascii_lowercase()
}

/// `[a-z0-9-]{1,63}` without a leading or trailing hyphen
pub fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

pub fn is_reserved(label: &str) -> bool {
    RESERVED_SUBDOMAINS.contains(&label)
}

/// Normalize and validate a subdomain a user asks to register
pub fn validate_subdomain(raw: &str) -> Result<String, TenantError> {
    let label = raw.trim().to_ascii_lowercase();
    if !is_valid_label(&label) {
        return Err(TenantError::Invalid(format!(
            "'{}' must be 1-63 characters of a-z, 0-9 or '-', not starting or ending with '-'",
            raw.trim()
        )));
    }
    if is_reserved(&label) {
        return Err(TenantError::Reserved(label));
    }
    Ok(label)
}

/// Normalize and validate a custom domain. Domains under `main_domain`
/// are rejected, they already belong to the platform.
pub fn validate_custom_domain(raw: &str, main_domain: &str) -> Result<String, TenantError> {
    let domain = normalize_host(raw);
    let labels: Vec<&str> = domain.split('.').collect();

    let well_formed = domain.len() <= 253
        && labels.len() >= 2
        && labels.iter().all(|l| is_valid_label(l))
        && labels
            .last()
            .is_some_and(|tld| tld.bytes().any(|b| b.is_ascii_lowercase()));
    if !well_formed {
        return Err(TenantError::Invalid(format!(
            "'{}' is not a valid domain name",
            raw.trim()
        )));
    }

    if domain == main_domain || domain.ends_with(&format!(".{}", main_domain)) {
        return Err(TenantError::Invalid(format!(
            "'{}' is part of {} and cannot be linked",
            domain, main_domain
        )));
    }

    Ok(domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("MAIN.example:8080"), "main.example");
        assert_eq!(normalize_host(" randomsite.com "), "randomsite.com");
        assert_eq!(normalize_host("localhost"), "localhost");
    }

    #[test]
    fn test_label_syntax() {
        assert!(is_valid_label("dhaval"));
        assert!(is_valid_label("a-1"));
        assert!(!is_valid_label(""));
        assert!(!is_valid_label("-lead"));
        assert!(!is_valid_label("trail-"));
        assert!(!is_valid_label("Upper"));
        assert!(!is_valid_label("a.b"));
        assert!(!is_valid_label(&"x".repeat(64)));
    }

    #[test]
    fn test_validate_subdomain() {
        assert_eq!(validate_subdomain(" Dhaval ").unwrap(), "dhaval");
        assert!(matches!(validate_subdomain("www"), Err(TenantError::Reserved(_))));
        assert!(matches!(validate_subdomain("Blog"), Err(TenantError::Reserved(_))));
        assert!(matches!(validate_subdomain("no_underscores"), Err(TenantError::Invalid(_))));
    }

    #[test]
    fn test_validate_custom_domain() {
        assert_eq!(
            validate_custom_domain("Abhinav.Dev.", "inscribe.so").unwrap(),
            "abhinav.dev"
        );
        assert!(validate_custom_domain("localhost", "inscribe.so").is_err());
        assert!(validate_custom_domain("blog.inscribe.so", "inscribe.so").is_err());
        assert!(validate_custom_domain("inscribe.so", "inscribe.so").is_err());
        assert!(validate_custom_domain("10.0.0.1", "inscribe.so").is_err());
        assert!(validate_custom_domain("bad_domain.com", "inscribe.so").is_err());
    }

    #[test]
    fn test_context_from_request() {
        let req = HttpRequest::new("GET", "/dhaval/blog/x")
            .with_header(TENANT_HEADER, "dhaval")
            .with_header(ORIGINAL_PATH_HEADER, "/blog/x");
        let ctx = TenantContext::from_request(&req).unwrap();
        assert_eq!(ctx.subdomain, "dhaval");
        assert_eq!(ctx.original_path, "/blog/x");

        assert!(TenantContext::from_request(&HttpRequest::new("GET", "/")).is_none());
    }
}
