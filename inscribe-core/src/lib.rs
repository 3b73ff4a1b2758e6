//! # Inscribe Core
//!
//! HTTP building blocks shared by every Inscribe service:
//!
//! - [`HttpRequest`] / [`HttpResponse`] - owned request and response types
//! - [`Router`] - method + path-pattern dispatch with `:param` segments
//! - [`Middleware`] / [`MiddlewareChain`] - request pipeline
//! - [`Application`] - the hyper HTTP/1.1 server loop
//! - [`Error`] - framework error with HTTP status mapping
//!
//! ```
//! use inscribe_core::{Application, HttpResponse, MiddlewareChain, Router};
//!
//! let mut router = Router::new();
//! router.get("/api/health", |_req| async { HttpResponse::json_ok(&"ok") });
//!
//! let app = Application::new(router, MiddlewareChain::new());
//! # let _ = app;
//! ```

pub mod application;
pub mod error;
pub mod http;
pub mod middleware;
pub mod routing;

pub use application::{Application, DEFAULT_MAX_BODY_BYTES};
pub use error::{Error, Result};
pub use http::{HttpRequest, HttpResponse};
pub use middleware::{
    BodySizeLimitMiddleware, LoggingMiddleware, Middleware, MiddlewareChain, Next,
    RequestIdMiddleware,
};
pub use routing::{HandlerFn, HttpMethod, Route, Router};
