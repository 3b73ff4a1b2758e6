// Middleware system for request/response processing

use crate::{Error, HandlerFn, HttpRequest, HttpResponse};
use async_trait::async_trait;
use inscribe_log::{debug, error, info, trace, warn};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Type alias for the next handler in the middleware chain
pub type Next = Box<
    dyn FnOnce(HttpRequest) -> Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>
        + Send,
>;

/// Middleware trait for processing requests before they reach the handler
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Process the request and optionally pass to next middleware
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error>;
}

/// Middleware chain executor
#[derive(Clone)]
pub struct MiddlewareChain {
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            middlewares: Arc::new(Vec::new()),
        }
    }

    /// Add a middleware to the chain. Middlewares run in insertion order.
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.use_shared(Arc::new(middleware));
    }

    /// Add an already shared middleware
    pub fn use_shared(&mut self, middleware: Arc<dyn Middleware>) {
        let mut mws = (*self.middlewares).clone();
        mws.push(middleware);
        self.middlewares = Arc::new(mws);
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Execute the middleware chain with a handler
    pub async fn apply(&self, req: HttpRequest, handler: HandlerFn) -> Result<HttpResponse, Error> {
        debug!(
            middleware_count = self.middlewares.len(),
            path = %req.path,
            method = %req.method,
            "Executing middleware chain"
        );
        self.execute_from(0, req, handler).await
    }

    fn execute_from(
        &self,
        index: usize,
        req: HttpRequest,
        handler: HandlerFn,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>> {
        if index >= self.middlewares.len() {
            trace!("Middleware chain complete, calling handler");
            handler(req)
        } else {
            let middleware = self.middlewares[index].clone();
            let chain = self.clone();

            trace!(middleware_index = index, "Executing middleware");
            Box::pin(async move {
                middleware
                    .handle(
                        req,
                        Box::new(move |req| chain.execute_from(index + 1, req, handler)),
                    )
                    .await
            })
        }
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}

// ========== Built-in Middleware ==========

/// Request ID middleware
///
/// Reuses a client supplied `x-request-id` or generates a UUID v4, and echoes
/// it on the response.
pub struct RequestIdMiddleware;

#[async_trait]
impl Middleware for RequestIdMiddleware {
    async fn handle(&self, mut req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        let request_id = req
            .header("x-request-id")
            .filter(|id| !id.is_empty() && id.len() <= 128)
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        req.set_header("x-request-id", request_id.clone());

        let mut response = next(req).await?;
        response
            .headers
            .insert("x-request-id".to_string(), request_id);

        Ok(response)
    }
}

/// Body size limit middleware
pub struct BodySizeLimitMiddleware {
    max_size: usize,
}

impl BodySizeLimitMiddleware {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }
}

#[async_trait]
impl Middleware for BodySizeLimitMiddleware {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        if req.body.len() > self.max_size {
            warn!(
                size = req.body.len(),
                limit = self.max_size,
                path = %req.path,
                "Rejecting oversized request body"
            );
            return Err(Error::PayloadTooLarge(format!(
                "Request body exceeds maximum size of {} bytes",
                self.max_size
            )));
        }

        next(req).await
    }
}

/// Structured request logging
///
/// Emits one event when a request arrives and one when it completes, with
/// method, path, host, status and duration fields.
///
/// ```
/// use inscribe_core::{LoggingMiddleware, MiddlewareChain};
///
/// let mut chain = MiddlewareChain::new();
/// chain.use_middleware(LoggingMiddleware::new());
/// ```
pub struct LoggingMiddleware {
    /// Log request bodies
    pub log_request_body: bool,
    /// Maximum body size to log (in bytes)
    pub max_body_size: usize,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self {
            log_request_body: false,
            max_body_size: 1024,
        }
    }

    pub fn with_request_body(mut self, enable: bool) -> Self {
        self.log_request_body = enable;
        self
    }

    fn body_preview(&self, body: &[u8]) -> String {
        if body.len() > self.max_body_size {
            format!(
                "{}... ({} bytes)",
                String::from_utf8_lossy(&body[..self.max_body_size]),
                body.len()
            )
        } else {
            String::from_utf8_lossy(body).to_string()
        }
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        let start = Instant::now();
        let method = req.method.clone();
        let path = req.path.clone();
        let host = req.host().unwrap_or_default().to_string();
        let request_id = req.header("x-request-id").unwrap_or_default().to_string();

        if self.log_request_body && !req.body.is_empty() {
            info!(
                method = %method,
                path = %path,
                host = %host,
                request_id = %request_id,
                body = %self.body_preview(&req.body),
                "HTTP request received"
            );
        } else {
            info!(
                method = %method,
                path = %path,
                host = %host,
                request_id = %request_id,
                "HTTP request received"
            );
        }

        let result = next(req).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => info!(
                method = %method,
                path = %path,
                status = response.status,
                duration_ms = duration.as_millis() as u64,
                request_id = %request_id,
                "HTTP response sent"
            ),
            Err(err) if err.is_server_error() => error!(
                method = %method,
                path = %path,
                status = err.status_code(),
                duration_ms = duration.as_millis() as u64,
                request_id = %request_id,
                error = %err,
                "HTTP request failed"
            ),
            Err(err) => info!(
                method = %method,
                path = %path,
                status = err.status_code(),
                duration_ms = duration.as_millis() as u64,
                request_id = %request_id,
                error = %err,
                "HTTP request rejected"
            ),
        }

        result
    }
}
