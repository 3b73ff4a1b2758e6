//! Session tokens for Inscribe
//!
//! Stateless HS256 session tokens binding a user to the tenant they own,
//! plus the `Set-Cookie` strings that carry them.
//!
//! ```
//! use inscribe_jwt::{JwtConfig, JwtService, SessionCookie};
//!
//! let service = JwtService::new(JwtConfig::new("0123456789abcdef0123456789abcdef")).unwrap();
//! let token = service.issue_session("user-1", "dhaval", "d@example.com").unwrap();
//! let claims = service.verify_session(&token).unwrap();
//! assert_eq!(claims.tenant, "dhaval");
//!
//! let header = SessionCookie::new("inscribe_session").build(&token);
//! assert!(header.contains("HttpOnly"));
//! ```

pub mod claims;
pub mod config;
pub mod cookie;
pub mod error;
pub mod service;

pub use claims::SessionClaims;
pub use config::JwtConfig;
pub use cookie::{SameSite, SessionCookie};
pub use error::{JwtError, Result};
pub use service::JwtService;

pub use jsonwebtoken::Algorithm;
