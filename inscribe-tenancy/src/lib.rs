//! # Inscribe Tenancy
//!
//! Everything that makes Inscribe multi-tenant:
//!
//! - [`DirectoryCache`] - `custom hostname → tenant` snapshot, refreshed from a
//!   [`DirectorySource`]
//! - [`HostResolver`] - classifies a hostname as the main domain, a tenant
//!   subdomain, a custom domain or unknown
//! - [`TenantRoutingMiddleware`] - pass-through, rewrite or redirect per request
//! - [`StorageGateway`] - one lazily created SQLite store per tenant
//! - [`TenantRegistry`] - tenants, users and password reset tokens
//! - [`DomainProvisioner`] - custom domain registration with the DNS provider
//! - [`ResetNotifier`] - out-of-band delivery of password reset tokens
//!
//! ## Routing
//!
//! ```no_run
//! use inscribe_core::MiddlewareChain;
//! use inscribe_tenancy::{
//!     DirectoryCache, DirectorySource, HostResolver, HttpDirectorySource,
//!     TenantRoutingMiddleware,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source: Arc<dyn DirectorySource> = Arc::new(HttpDirectorySource::new(
//!     "https://inscribe.so",
//!     Duration::from_secs(2),
//! )?);
//! let cache = Arc::new(DirectoryCache::new(source.clone()));
//! let resolver = Arc::new(HostResolver::new("inscribe.so", cache, source));
//!
//! let mut chain = MiddlewareChain::new();
//! chain.use_middleware(TenantRoutingMiddleware::new(resolver));
//! # Ok(())
//! # }
//! ```

pub mod directory;
pub mod error;
pub mod notifier;
pub mod password;
pub mod provisioner;
pub mod registry;
pub mod resolver;
pub mod routing;
pub mod source;
pub mod storage;
pub mod tenant;

pub use directory::{DirectoryCache, DirectorySnapshot};
pub use error::{DirectoryError, ProvisionError, Result, StorageError, TenantError};
pub use notifier::{LogResetNotifier, ResetNotifier};
pub use password::PasswordHasher;
pub use provisioner::{DomainProvisioner, NoOpProvisioner, ZoneApiProvisioner};
pub use registry::{TenantRegistry, User};
pub use resolver::{HostClass, HostResolver, Resolution};
pub use routing::{BypassRules, RouteDecision, TenantRoutingMiddleware, rewrite_path};
pub use source::{DirectorySource, HttpDirectorySource, RegistryDirectorySource};
pub use storage::{Record, RunResult, SqlValue, Statement, StorageConfig, StorageGateway};
pub use tenant::{ORIGINAL_PATH_HEADER, TENANT_HEADER, Tenant, TenantContext};
