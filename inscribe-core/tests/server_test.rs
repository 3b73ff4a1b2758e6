//! End-to-end tests for the hyper server loop over a real socket

use inscribe_core::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

fn app() -> Application {
    let mut router = Router::new();
    router.get("/api/health", |req| async move {
        HttpResponse::json_ok(&serde_json::json!({
            "status": "ok",
            "host": req.host(),
            "query": req.query("check"),
        }))
    });
    router.post("/echo", |req| async move {
        Ok(HttpResponse::ok().with_body(req.body))
    });

    let mut chain = MiddlewareChain::new();
    chain.use_middleware(RequestIdMiddleware);
    chain.use_middleware(LoggingMiddleware::new());
    Application::new(router, chain)
}

async fn send_raw(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    String::from_utf8_lossy(&buf).to_string()
}

#[tokio::test]
async fn test_serves_requests_until_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    let server = tokio::spawn(app().serve(listener, async {
        let _ = rx.await;
    }));

    let response = send_raw(
        addr,
        "GET /api/health?check=1 HTTP/1.1\r\nHost: Main.Example\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("x-request-id"));
    assert!(response.contains("\"host\":\"Main.Example\""));
    assert!(response.contains("\"query\":\"1\""));

    let response = send_raw(
        addr,
        "POST /echo HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("hello"));

    tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_oversized_body_rejected_before_dispatch() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    let server = tokio::spawn(app().with_max_body_bytes(8).serve(listener, async {
        let _ = rx.await;
    }));

    let response = send_raw(
        addr,
        "POST /echo HTTP/1.1\r\nHost: x\r\nContent-Length: 16\r\nConnection: close\r\n\r\n0123456789abcdef",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 413"), "{response}");
    assert!(response.contains("\"status\":413"));
    assert!(!response.contains("0123456789abcdef"));

    let response = send_raw(
        addr,
        "POST /echo HTTP/1.1\r\nHost: x\r\nContent-Length: 8\r\nConnection: close\r\n\r\n01234567",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.ends_with("01234567"));

    tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_errors_render_as_json() {
    let app = app();

    let resp = app.handle(HttpRequest::new("GET", "/missing")).await;
    assert_eq!(resp.status, 404);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["status"], 404);

    let resp = app.handle(HttpRequest::new("PUT", "/api/health")).await;
    assert_eq!(resp.status, 405);
}
