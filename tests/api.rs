mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::json;

use common::TestApp;
use waitlist::store::Store;

const FAILURE: &str = "Unable to verify signup. Please try again later.";

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let reply = app.get("/health", None).await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_public_project() {
    let app = TestApp::new();

    let reply = app.get("/p/nope", None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = app.sign_up("nope", "", "a@example.com", "198.51.100.1").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_public_project_exposes_name_only() {
    let app = TestApp::new();
    let token = app.login("owner@example.com").await;
    let (id, slug) = app.create_project(&token, "Launch Week", None).await;
    assert_eq!(slug, "launch-week");

    let reply = app.get("/p/launch-week", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["id"], id.as_str());
    assert_eq!(reply.body["data"]["name"], "Launch Week");
    assert!(reply.body["data"].get("owner_id").is_none());
}

#[tokio::test]
async fn test_signup_records_source() {
    let app = TestApp::new();
    let token = app.login("owner@example.com").await;
    let (id, slug) = app.create_project(&token, "Launch", None).await;

    let reply = app
        .sign_up(&slug, "?src=twitter", "a@example.com", "198.51.100.1")
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["data"]["status"], "success");
    assert_eq!(reply.body["data"]["message"], "Spot reserved.");

    let reply = app
        .sign_up(&slug, "", "b@example.com", "198.51.100.2")
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let reply = app
        .get(&format!("/api/v1/projects/{id}/signups"), Some(&token))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let signups = reply.body["data"].as_array().expect("signups");
    assert_eq!(signups.len(), 2);
    assert_eq!(signups[0]["email"], "a@example.com");
    assert_eq!(signups[0]["source"], "twitter");
    assert_eq!(signups[0]["ip_address"], "198.51.100.1");
    assert_eq!(signups[1]["source"], "direct");
}

#[tokio::test]
async fn test_every_rejection_looks_the_same() {
    let app = TestApp::new();
    let token = app.login("owner@example.com").await;
    let (_, slug) = app.create_project(&token, "Launch", None).await;

    let ok = app
        .sign_up(&slug, "", "taken@example.com", "198.51.100.1")
        .await;
    assert_eq!(ok.status, StatusCode::CREATED);

    let long_source = format!("?src={}", "x".repeat(101));
    let rejections = [
        app.sign_up(&slug, "", "not-an-email", "198.51.100.2").await,
        app.sign_up(&slug, &long_source, "c@example.com", "198.51.100.3")
            .await,
        app.sign_up(&slug, "", "taken@example.com", "198.51.100.4")
            .await,
        app.sign_up(&slug, "", "d@example.com", "198.51.100.1").await,
    ];

    for reply in &rejections {
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.body["data"], serde_json::Value::Null);
        assert_eq!(reply.body["error"], FAILURE);
    }

    let malformed = Request::builder()
        .method("POST")
        .uri(format!("/p/{slug}/signups"))
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "198.51.100.9")
        .body(Body::from("{\"mail\":1}"))
        .expect("request");
    let reply = app.send(malformed).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], FAILURE);
}

#[tokio::test]
async fn test_rate_limit_counts_rejected_attempts() {
    let app = TestApp::new();
    let token = app.login("owner@example.com").await;
    let (id, slug) = app.create_project(&token, "Launch", None).await;

    let first = app.sign_up(&slug, "", "a@example.com", "203.0.113.7").await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = app.sign_up(&slug, "", "b@example.com", "203.0.113.7").await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);

    let attempt = app
        .store
        .get_signup_attempt(&id, "203.0.113.7")
        .expect("read ledger")
        .expect("ledger row");
    assert_eq!(attempt.attempt_count, 2);

    let other_ip = app.sign_up(&slug, "", "b@example.com", "203.0.113.8").await;
    assert_eq!(other_ip.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_untrusted_proxy_header_is_ignored() {
    let app = TestApp::with_config(waitlist::config::ServerConfig {
        trust_forwarded_for: false,
        ..Default::default()
    });
    let token = app.login("owner@example.com").await;
    let (id, slug) = app.create_project(&token, "Launch", None).await;

    for email in ["a@example.com", "b@example.com"] {
        let reply = app.sign_up(&slug, "", email, "203.0.113.7").await;
        assert_eq!(reply.status, StatusCode::CREATED);
    }

    let reply = app
        .get(&format!("/api/v1/projects/{id}/signups"), Some(&token))
        .await;
    let signups = reply.body["data"].as_array().expect("signups");
    assert!(signups.iter().all(|s| s["ip_address"].is_null()));
}

#[tokio::test]
async fn test_magic_link_flow() {
    let app = TestApp::new();

    let reply = app
        .post_json(
            "/auth/magic-link",
            None,
            json!({ "email": "  Owner@Example.com " }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.body["data"]["message"],
        "Check your email for the magic link!"
    );

    {
        let links = app.sender.links.lock().expect("sender lock");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].0, "owner@example.com");
        assert!(links[0].1.starts_with("https://join.example.com/auth/callback?token="));
    }

    let magic = app.sender.last_token();
    let callback = format!("/auth/callback?token={}", urlencoding::encode(&magic));
    let reply = app.get(&callback, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let cookie = reply
        .headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("session cookie");
    assert!(cookie.starts_with("session=wls_"));
    assert!(cookie.contains("HttpOnly"));

    let session = reply.body["data"]["token"].as_str().expect("token");
    let me = app.get("/api/v1/me", Some(session)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["data"]["email"], "owner@example.com");

    let cookie_pair = cookie.split(';').next().expect("cookie pair");
    let request = Request::builder()
        .uri("/api/v1/me")
        .header(header::COOKIE, cookie_pair)
        .body(Body::empty())
        .expect("request");
    assert_eq!(app.send(request).await.status, StatusCode::OK);

    let reused = app.get(&callback, None).await;
    assert_eq!(reused.status, StatusCode::GONE);
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new();
    let token = app.login("owner@example.com").await;

    let request = Request::builder()
        .method("POST")
        .uri("/auth/logout")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request");
    let reply = app.send(request).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    let me = app.get("/api/v1/me", Some(&token)).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unauthenticated_requests() {
    let app = TestApp::new();

    let reply = app.get("/api/v1/projects", None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert!(reply.headers.contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(reply.body["data"], serde_json::Value::Null);

    let reply = app.get("/api/v1/projects", Some("wls_bogus_token")).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/v1/projects")
        .header(header::ACCEPT, "text/html,application/xhtml+xml")
        .body(Body::empty())
        .expect("request");
    let reply = app.send(request).await;
    assert!(reply.status.is_redirection());
    assert_eq!(
        reply.headers.get(header::LOCATION).and_then(|v| v.to_str().ok()),
        Some("/login")
    );
}

#[tokio::test]
async fn test_slug_conflicts() {
    let app = TestApp::new();
    let token = app.login("owner@example.com").await;
    let (_, slug) = app.create_project(&token, "My Launch!", None).await;
    assert_eq!(slug, "my-launch");

    let reply = app
        .post_json(
            "/api/v1/projects",
            Some(&token),
            json!({ "name": "Another", "slug": "my-launch" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(
        reply.body["error"],
        "This slug is already taken. Please choose a different one."
    );

    let reply = app
        .post_json(
            "/api/v1/projects",
            Some(&token),
            json!({ "name": "Bad", "slug": "Not Valid" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_projects_are_scoped_to_their_owner() {
    let app = TestApp::new();
    let alice = app.login("alice@example.com").await;
    let bob = app.login("bob@example.com").await;
    let (id, _) = app.create_project(&alice, "Alice Launch", None).await;

    let reply = app.get(&format!("/api/v1/projects/{id}"), Some(&bob)).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = app
        .get(&format!("/api/v1/projects/{id}/signups"), Some(&bob))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = app.get("/api/v1/projects", Some(&bob)).await;
    assert_eq!(reply.body["data"].as_array().map(Vec::len), Some(0));

    let reply = app.get("/api/v1/projects", Some(&alice)).await;
    assert_eq!(reply.body["data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_project_attribution() {
    let app = TestApp::new();
    let token = app.login("owner@example.com").await;
    let (id, slug) = app.create_project(&token, "Launch", None).await;

    let visits = [
        ("?src=twitter", "a@example.com"),
        ("?src=twitter", "b@example.com"),
        ("", "c@example.com"),
        ("?src=linkedin", "d@example.com"),
    ];
    for (i, (query, email)) in visits.iter().enumerate() {
        let ip = format!("198.51.100.{}", i + 1);
        let reply = app.sign_up(&slug, query, email, &ip).await;
        assert_eq!(reply.status, StatusCode::CREATED);
    }

    let reply = app.get(&format!("/api/v1/projects/{id}"), Some(&token)).await;
    assert_eq!(reply.status, StatusCode::OK);
    let attribution = &reply.body["data"]["attribution"];
    assert_eq!(attribution["total"], 4);
    assert_eq!(
        attribution["breakdown"],
        json!([
            { "source": "twitter", "count": 2 },
            { "source": "direct", "count": 1 },
            { "source": "linkedin", "count": 1 },
        ])
    );
    assert_eq!(reply.body["data"]["public_path"], format!("/p/{slug}"));

    let reply = app.get("/api/v1/projects", Some(&token)).await;
    let summary = &reply.body["data"][0];
    assert_eq!(summary["signup_count"], 4);
    assert_eq!(summary["last_signup"]["ago"], "just now");
}

#[tokio::test]
async fn test_tracking_link() {
    let app = TestApp::new();
    let token = app.login("owner@example.com").await;
    let (id, slug) = app.create_project(&token, "Launch", None).await;

    let reply = app
        .get(&format!("/api/v1/projects/{id}/link"), Some(&token))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.body["data"]["url"],
        format!("https://join.example.com/p/{slug}?src=twitter")
    );
    assert_eq!(reply.body["data"]["presets"].as_array().map(Vec::len), Some(4));

    let reply = app
        .get(
            &format!("/api/v1/projects/{id}/link?src=spring%20promo"),
            Some(&token),
        )
        .await;
    assert_eq!(
        reply.body["data"]["url"],
        format!("https://join.example.com/p/{slug}?src=spring%20promo")
    );

    for query in ["?src=", "?src=%20"] {
        let reply = app
            .get(&format!("/api/v1/projects/{id}/link{query}"), Some(&token))
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["data"]["source"], "twitter");
        assert_eq!(
            reply.body["data"]["url"],
            format!("https://join.example.com/p/{slug}?src=twitter")
        );
    }
}
