// Application and HTTP server

use crate::{Error, HandlerFn, HttpRequest, HttpResponse, MiddlewareChain, Router};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, body::Incoming as IncomingBody};
use hyper_util::rt::TokioIo;
use inscribe_log::{debug, info, warn};
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Largest request body the server reads unless configured otherwise
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A router plus the middleware chain that wraps it
#[derive(Clone)]
pub struct Application {
    router: Arc<Router>,
    chain: MiddlewareChain,
    max_body_bytes: usize,
}

impl Application {
    pub fn new(router: Router, chain: MiddlewareChain) -> Self {
        Self {
            router: Arc::new(router),
            chain,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Stop reading request bodies past `bytes`; larger ones get a 413
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Dispatch one request through the middleware chain and router.
    ///
    /// Errors are rendered as `{"error", "status"}` JSON responses, so this
    /// never fails. Used by the server loop and directly by tests.
    pub async fn handle(&self, req: HttpRequest) -> HttpResponse {
        let router = self.router.clone();
        let handler: HandlerFn = Arc::new(
            move |req: HttpRequest| -> Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>> {
                let router = router.clone();
                Box::pin(async move { router.route(req).await })
            },
        );

        match self.chain.apply(req, handler).await {
            Ok(resp) => resp,
            Err(err) => err.into_response(),
        }
    }

    /// Bind `addr` and serve until the process is stopped
    pub async fn listen(self, addr: SocketAddr) -> Result<(), Error> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, std::future::pending::<()>()).await
    }

    /// Serve connections from `listener` until `shutdown` resolves.
    ///
    /// In-flight connections keep running on their own tasks after the
    /// accept loop stops.
    pub async fn serve<S>(self, listener: TcpListener, shutdown: S) -> Result<(), Error>
    where
        S: Future<Output = ()> + Send,
    {
        let local = listener.local_addr()?;
        info!(address = %local, "Server listening");

        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = &mut shutdown => {
                    info!("Shutdown signal received, no longer accepting connections");
                    return Ok(());
                }
            };

            let io = TokioIo::new(stream);
            let app = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<IncomingBody>| {
                    let app = app.clone();
                    async move { handle_request(req, app).await }
                });

                let conn: Pin<Box<dyn Future<Output = Result<(), hyper::Error>> + Send>> =
                    Box::pin(http1::Builder::new().serve_connection(io, service));
                if let Err(err) = conn.await {
                    debug!(peer = %peer, error = %err, "Error serving connection");
                }
            });
        }
    }
}

/// Convert a hyper request, dispatch it, and convert the response back
async fn handle_request(
    req: Request<IncomingBody>,
    app: Application,
) -> Result<Response<Full<bytes::Bytes>>, BoxError> {
    let method = req.method().to_string();
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let mut inscribe_req = HttpRequest::new(method, target);

    for (name, value) in req.headers() {
        match value.to_str() {
            Ok(value_str) => inscribe_req.set_header(name.as_str(), value_str),
            Err(_) => warn!(header = %name, "Dropping non-ASCII header value"),
        }
    }

    // HTTP/1.1 requests carry the host in the header; absolute-form targets in the URI
    if inscribe_req.host().is_none() {
        if let Some(authority) = req.uri().authority() {
            inscribe_req.set_header("host", authority.as_str());
        }
    }

    let limit = app.max_body_bytes;
    let body_bytes = match Limited::new(req.into_body(), limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            warn!(limit, path = %inscribe_req.path, "Rejecting oversized request body");
            let response = Error::PayloadTooLarge(format!(
                "Request body exceeds maximum size of {} bytes",
                limit
            ))
            .into_response();
            return Ok(into_hyper_response(response));
        }
        Err(err) => return Err(err),
    };
    inscribe_req.body = body_bytes.to_vec();

    let response = app.handle(inscribe_req).await;
    Ok(into_hyper_response(response))
}

fn into_hyper_response(response: HttpResponse) -> Response<Full<bytes::Bytes>> {
    let mut builder = Response::builder().status(response.status);
    for (key, value) in &response.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }

    let body = Full::new(bytes::Bytes::from(response.body));
    match builder.body(body) {
        Ok(resp) => resp,
        Err(err) => {
            warn!(error = %err, "Handler produced an invalid response");
            let mut fallback = Response::new(Full::new(bytes::Bytes::new()));
            *fallback.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        }
    }
}
