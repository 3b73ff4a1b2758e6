//! End-to-end workflows through the full middleware chain and route table,
//! backed by SQLite stores in a temporary directory.

use async_trait::async_trait;
use inscribe::{AppState, build_application};
use inscribe_config::PlatformSettings;
use inscribe_core::{Application, HttpRequest, HttpResponse};
use inscribe_tenancy::{ResetNotifier, User};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;

const MAIN: &str = "main.example";

/// Collects `(email, token)` pairs instead of mailing them
#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<(String, String)>>,
}

impl Outbox {
    fn token_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
    }
}

#[async_trait]
impl ResetNotifier for Outbox {
    async fn send_reset(&self, user: &User, token: &str) -> inscribe_tenancy::Result<()> {
        self.sent.lock().push((user.email.clone(), token.to_string()));
        Ok(())
    }
}

struct Platform {
    app: Application,
    outbox: Arc<Outbox>,
    _dir: tempfile::TempDir,
}

fn platform() -> Platform {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = PlatformSettings::default();
    settings.domain.main_domain = MAIN.to_string();
    settings.storage.data_dir = dir.path().to_path_buf();
    settings.session.secret = "test-secret-that-is-at-least-32-bytes!".to_string();
    settings.session.secure_cookie = false;

    let outbox = Arc::new(Outbox::default());
    let state = AppState::with_notifier(settings, outbox.clone()).unwrap();
    Platform {
        app: build_application(state),
        outbox,
        _dir: dir,
    }
}

impl Platform {
    async fn send(
        &self,
        method: &str,
        host: &str,
        target: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> HttpResponse {
        let mut req = HttpRequest::new(method, target).with_header("Host", host);
        if let Some(token) = token {
            req = req.with_header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = body {
            req = req
                .with_header("Content-Type", "application/json")
                .with_json(&body)
                .unwrap();
        }
        self.app.handle(req).await
    }

    async fn get(&self, host: &str, target: &str) -> HttpResponse {
        self.send("GET", host, target, None, None).await
    }

    /// Register an owner and return their bearer token
    async fn register(&self, subdomain: &str, email: &str) -> String {
        let res = self
            .send(
                "POST",
                MAIN,
                "/api/auth/register",
                None,
                Some(json!({
                    "subdomain": subdomain,
                    "displayName": format!("{}'s blog", subdomain),
                    "email": email,
                    "password": "correct horse battery",
                })),
            )
            .await;
        assert_eq!(res.status, 201, "{}", String::from_utf8_lossy(&res.body));
        let body: Value = res.json().unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn publish_post(&self, token: &str, title: &str) -> String {
        let res = self
            .send(
                "POST",
                MAIN,
                "/api/posts",
                Some(token),
                Some(json!({ "title": title, "content": "Hello there" })),
            )
            .await;
        assert_eq!(res.status, 201);
        let slug = res.json::<Value>().unwrap()["slug"].as_str().unwrap().to_string();

        let res = self
            .send("POST", MAIN, &format!("/api/posts/{}/publish", slug), Some(token), None)
            .await;
        assert_eq!(res.status, 200);
        slug
    }
}

// =============================================================================
// Edge routing
// =============================================================================

#[tokio::test]
async fn test_landing_and_unknown_hosts() {
    let p = platform();

    let res = p.get(MAIN, "/").await;
    assert_eq!(res.status, 200);
    assert_eq!(res.json::<Value>().unwrap()["name"], "Inscribe");

    let res = p.get("randomsite.com", "/anything").await;
    assert_eq!(res.status, 404);

    let res = p.get(MAIN, "/api/health").await;
    assert_eq!(res.status, 200);
    assert_eq!(res.json::<Value>().unwrap()["status"], "ok");
}

#[tokio::test]
async fn test_subdomain_rewrite_serves_blog() {
    let p = platform();
    let token = p.register("dhaval", "dhaval@example.com").await;
    let slug = p.publish_post(&token, "My Post").await;

    // Unpublished posts stay hidden
    let res = p
        .send("POST", MAIN, "/api/posts", Some(&token), Some(json!({ "title": "Draft" })))
        .await;
    assert_eq!(res.status, 201);

    let res = p.get("dhaval.main.example", "/").await;
    assert_eq!(res.status, 200);
    let body: Value = res.json().unwrap();
    assert_eq!(body["blog"]["subdomain"], "dhaval");
    assert_eq!(body["path"], "/");
    assert_eq!(body["posts"].as_array().unwrap().len(), 1);

    let res = p.get("dhaval.main.example", &format!("/blog/{}", slug)).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.json::<Value>().unwrap()["post"]["title"], "My Post");

    assert_eq!(p.get("dhaval.main.example", "/blog/draft").await.status, 404);
    assert_eq!(p.get("nobody.main.example", "/").await.status, 404);

    // The main domain path form reaches the same blog
    assert_eq!(p.get(MAIN, "/dhaval").await.status, 200);
}

#[tokio::test]
async fn test_custom_domain_redirect_and_rewrite() {
    let p = platform();
    let token = p.register("abhinav", "abhinav@example.com").await;
    p.publish_post(&token, "My Post").await;

    let res = p
        .send(
            "POST",
            MAIN,
            "/api/tenant/domain",
            Some(&token),
            Some(json!({ "domain": "Abhinav.dev" })),
        )
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.json::<Value>().unwrap()["url"], "https://abhinav.dev");

    let res = p.get(MAIN, "/abhinav/blog/my-post").await;
    assert_eq!(res.status, 301);
    assert_eq!(res.header("location"), Some("https://abhinav.dev/blog/my-post"));
    assert_eq!(res.header("cache-control"), Some("public, max-age=31536000"));

    let res = p.get("abhinav.main.example", "/blog/my-post?ref=x").await;
    assert_eq!(res.status, 301);
    assert_eq!(res.header("location"), Some("https://abhinav.dev/blog/my-post?ref=x"));

    let res = p.get("abhinav.dev", "/blog/my-post").await;
    assert_eq!(res.status, 200);
    assert_eq!(res.json::<Value>().unwrap()["blog"]["url"], "https://abhinav.dev");

    // Directory endpoints
    let res = p.get(MAIN, "/api/subdomains").await;
    let body: Value = res.json().unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["abhinav.dev"], "abhinav");

    let res = p.get(MAIN, "/api/get-custom-domain?subdomain=abhinav").await;
    assert_eq!(res.json::<Value>().unwrap()["customDomain"], "abhinav.dev");
    let res = p.get(MAIN, "/api/get-custom-domain?subdomain=nobody").await;
    assert!(res.json::<Value>().unwrap()["customDomain"].is_null());
    assert_eq!(p.get(MAIN, "/api/get-custom-domain").await.status, 400);
}

#[tokio::test]
async fn test_spoofed_tenant_header_is_ignored() {
    let p = platform();
    p.register("dhaval", "dhaval@example.com").await;

    let req = HttpRequest::new("GET", "/anything")
        .with_header("Host", "randomsite.com")
        .with_header("x-inscribe-tenant", "dhaval");
    // `/anything` is not a tenant
    assert_eq!(p.app.handle(req).await.status, 404);
}

// =============================================================================
// Accounts and sessions
// =============================================================================

#[tokio::test]
async fn test_register_validation_and_conflicts() {
    let p = platform();
    p.register("dhaval", "dhaval@example.com").await;

    let attempt = |subdomain: &str, email: &str| {
        json!({ "subdomain": subdomain, "email": email, "password": "long enough pw" })
    };

    let res = p
        .send("POST", MAIN, "/api/auth/register", None, Some(attempt("dhaval", "x@example.com")))
        .await;
    assert_eq!(res.status, 409);

    let res = p
        .send("POST", MAIN, "/api/auth/register", None, Some(attempt("admin", "y@example.com")))
        .await;
    assert_eq!(res.status, 400);

    let res = p
        .send("POST", MAIN, "/api/auth/register", None, Some(attempt("Bad_Name", "z@example.com")))
        .await;
    assert_eq!(res.status, 400);

    let res = p.send("POST", MAIN, "/api/auth/register", None, None).await;
    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn test_login_cookie_session_and_logout() {
    let p = platform();
    p.register("dhaval", "dhaval@example.com").await;

    let res = p
        .send(
            "POST",
            MAIN,
            "/api/auth/login",
            None,
            Some(json!({ "email": "DHAVAL@example.com", "password": "correct horse battery" })),
        )
        .await;
    assert_eq!(res.status, 200);
    let cookie = res.header("set-cookie").unwrap().to_string();
    assert!(cookie.starts_with("inscribe_session="));
    assert!(cookie.contains("HttpOnly"));
    let pair = cookie.split(';').next().unwrap().to_string();

    let req = HttpRequest::new("GET", "/api/tenant")
        .with_header("Host", MAIN)
        .with_header("Cookie", pair);
    let res = p.app.handle(req).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.json::<Value>().unwrap()["tenant"]["subdomain"], "dhaval");

    let res = p
        .send(
            "POST",
            MAIN,
            "/api/auth/login",
            None,
            Some(json!({ "email": "dhaval@example.com", "password": "wrong password" })),
        )
        .await;
    assert_eq!(res.status, 401);

    let res = p.send("POST", MAIN, "/api/auth/logout", None, None).await;
    assert_eq!(res.status, 204);
    assert!(res.header("set-cookie").unwrap().contains("Max-Age=0"));
}

#[tokio::test]
async fn test_api_requires_session() {
    let p = platform();

    assert_eq!(p.get(MAIN, "/api/posts").await.status, 401);
    assert_eq!(p.send("GET", MAIN, "/api/posts", Some("garbage"), None).await.status, 401);
    assert_eq!(p.get(MAIN, "/api/tenant").await.status, 401);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let p = platform();
    p.register("dhaval", "dhaval@example.com").await;

    let res = p
        .send(
            "POST",
            MAIN,
            "/api/auth/password-reset",
            None,
            Some(json!({ "email": "dhaval@example.com" })),
        )
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.json::<Value>().unwrap(), json!({ "success": true }));
    let reset_token = p.outbox.token_for("dhaval@example.com").unwrap();

    let confirm = json!({ "token": reset_token, "password": "a brand new password" });
    let res = p
        .send("POST", MAIN, "/api/auth/password-reset/confirm", None, Some(confirm.clone()))
        .await;
    assert_eq!(res.status, 200);

    // Single use
    let res = p
        .send("POST", MAIN, "/api/auth/password-reset/confirm", None, Some(confirm))
        .await;
    assert_eq!(res.status, 400);

    let res = p
        .send(
            "POST",
            MAIN,
            "/api/auth/login",
            None,
            Some(json!({ "email": "dhaval@example.com", "password": "a brand new password" })),
        )
        .await;
    assert_eq!(res.status, 200);

    let res = p
        .send(
            "POST",
            MAIN,
            "/api/auth/password-reset",
            None,
            Some(json!({ "email": "nobody@example.com" })),
        )
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.json::<Value>().unwrap(), json!({ "success": true }));
    assert!(p.outbox.token_for("nobody@example.com").is_none());
}

#[tokio::test]
async fn test_reset_request_does_not_hand_over_account() {
    let p = platform();
    p.register("dhaval", "dhaval@example.com").await;

    // Anyone can ask for a reset of someone else's account
    let res = p
        .send(
            "POST",
            MAIN,
            "/api/auth/password-reset",
            None,
            Some(json!({ "email": "dhaval@example.com" })),
        )
        .await;
    assert_eq!(res.status, 200);
    let text = String::from_utf8_lossy(&res.body).to_string();
    let issued = p.outbox.token_for("dhaval@example.com").unwrap();
    assert!(!text.contains(&issued));
    assert!(!text.contains("Token"));

    // Without the delivered token the requester cannot set a password
    let zeros = "0".repeat(64);
    for guess in ["", "null", "deadbeef", zeros.as_str()] {
        let res = p
            .send(
                "POST",
                MAIN,
                "/api/auth/password-reset/confirm",
                None,
                Some(json!({ "token": guess, "password": "attacker password" })),
            )
            .await;
        assert_eq!(res.status, 400, "{guess}");
    }

    let res = p
        .send(
            "POST",
            MAIN,
            "/api/auth/login",
            None,
            Some(json!({ "email": "dhaval@example.com", "password": "attacker password" })),
        )
        .await;
    assert_eq!(res.status, 401);

    // The owner's token still works afterwards
    let res = p
        .send(
            "POST",
            MAIN,
            "/api/auth/password-reset/confirm",
            None,
            Some(json!({ "token": issued, "password": "owner chose this" })),
        )
        .await;
    assert_eq!(res.status, 200);
}

// =============================================================================
// Authoring
// =============================================================================

#[tokio::test]
async fn test_post_crud() {
    let p = platform();
    let token = p.register("dhaval", "dhaval@example.com").await;

    let res = p
        .send(
            "POST",
            MAIN,
            "/api/posts",
            Some(&token),
            Some(json!({ "title": "First", "slug": "first", "excerpt": "short" })),
        )
        .await;
    assert_eq!(res.status, 201);

    let res = p
        .send("POST", MAIN, "/api/posts", Some(&token), Some(json!({ "title": "First" })))
        .await;
    assert_eq!(res.status, 409);

    let res = p
        .send(
            "PUT",
            MAIN,
            "/api/posts/first",
            Some(&token),
            Some(json!({ "content": "Edited", "seoTitle": "First | Dhaval" })),
        )
        .await;
    assert_eq!(res.status, 200);
    let post: Value = res.json().unwrap();
    assert_eq!(post["content"], "Edited");
    assert_eq!(post["seoTitle"], "First | Dhaval");
    assert_eq!(post["excerpt"], "short");

    let res = p.send("GET", MAIN, "/api/posts/first", Some(&token), None).await;
    assert_eq!(res.json::<Value>().unwrap()["status"], "draft");

    let res = p.send("POST", MAIN, "/api/posts/first/publish", Some(&token), None).await;
    assert_eq!(res.json::<Value>().unwrap()["status"], "published");
    let res = p.send("POST", MAIN, "/api/posts/first/unpublish", Some(&token), None).await;
    assert_eq!(res.json::<Value>().unwrap()["status"], "draft");

    let res = p.send("DELETE", MAIN, "/api/posts/first", Some(&token), None).await;
    assert_eq!(res.status, 204);
    let res = p.send("GET", MAIN, "/api/posts/first", Some(&token), None).await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn test_tenants_only_see_their_own_posts() {
    let p = platform();
    let dhaval = p.register("dhaval", "dhaval@example.com").await;
    let abhinav = p.register("abhinav", "abhinav@example.com").await;

    p.publish_post(&dhaval, "Dhaval only").await;

    let res = p.send("GET", MAIN, "/api/posts", Some(&abhinav), None).await;
    assert!(res.json::<Value>().unwrap()["posts"].as_array().unwrap().is_empty());
    let res = p.get("abhinav.main.example", "/blog/dhaval-only").await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn test_import_is_all_or_nothing() {
    let p = platform();
    let token = p.register("dhaval", "dhaval@example.com").await;

    let mut posts: Vec<Value> = (1..=50)
        .map(|i| json!({ "title": format!("Imported {}", i), "status": "published" }))
        .collect();
    posts[29]["slug"] = json!("imported-1");

    let res = p
        .send("POST", MAIN, "/api/import", Some(&token), Some(json!({ "posts": posts })))
        .await;
    assert_eq!(res.status, 409);
    let error = res.json::<Value>().unwrap()["error"].as_str().unwrap().to_string();
    assert!(error.contains("record 30"), "{error}");

    let res = p.send("GET", MAIN, "/api/export", Some(&token), None).await;
    assert_eq!(res.status, 200);
    assert!(res.header("content-disposition").unwrap().contains("dhaval-export.json"));
    assert!(res.json::<Value>().unwrap()["posts"].as_array().unwrap().is_empty());

    posts[29]["slug"] = Value::Null;
    let res = p
        .send("POST", MAIN, "/api/import", Some(&token), Some(json!({ "posts": posts })))
        .await;
    assert_eq!(res.status, 201);
    assert_eq!(res.json::<Value>().unwrap()["imported"], 50);

    let res = p.get("dhaval.main.example", "/").await;
    assert_eq!(res.json::<Value>().unwrap()["posts"].as_array().unwrap().len(), 50);
}
