use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use waitlist::auth::LinkSender;
use waitlist::config::ServerConfig;
use waitlist::server::{AppState, create_router};
use waitlist::store::{SqliteStore, Store};

/// Keeps every issued login link instead of mailing it.
#[derive(Default)]
pub struct CapturingSender {
    pub links: Mutex<Vec<(String, String)>>,
}

impl LinkSender for CapturingSender {
    fn send_magic_link(&self, email: &str, link: &str) -> waitlist::error::Result<()> {
        self.links
            .lock()
            .expect("sender lock")
            .push((email.to_string(), link.to_string()));
        Ok(())
    }
}

impl CapturingSender {
    pub fn last_token(&self) -> String {
        let links = self.links.lock().expect("sender lock");
        let (_, link) = links.last().expect("a magic link was sent");
        let token = link
            .split_once("token=")
            .map(|(_, t)| t)
            .expect("link carries a token");
        urlencoding::decode(token).expect("decode token").into_owned()
    }
}

pub struct TestApp {
    pub _temp_dir: TempDir,
    pub router: Router,
    pub store: Arc<SqliteStore>,
    pub sender: Arc<CapturingSender>,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(ServerConfig {
            public_base_url: Some("https://join.example.com".to_string()),
            trust_forwarded_for: true,
            ..ServerConfig::default()
        })
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let store = SqliteStore::new(temp_dir.path().join("waitlist.db"))
            .expect("open store")
            .with_limits(config.signup_limits);
        store.initialize().expect("initialize store");
        let store = Arc::new(store);

        let sender = Arc::new(CapturingSender::default());
        let state = AppState::new(store.clone(), &config).with_link_sender(sender.clone());

        Self {
            _temp_dir: temp_dir,
            router: create_router(Arc::new(state)),
            store,
            sender,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Reply {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router never fails");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        Reply {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Reply {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).expect("request"))
            .await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> Reply {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    /// Posts a signup as a visitor coming from `ip`.
    pub async fn sign_up(&self, slug: &str, query: &str, email: &str, ip: &str) -> Reply {
        let request = Request::builder()
            .method("POST")
            .uri(format!("/p/{slug}/signups{query}"))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", ip)
            .body(Body::from(serde_json::json!({ "email": email }).to_string()))
            .expect("request");
        self.send(request).await
    }

    /// Runs the magic-link flow for `email` and returns the session token.
    pub async fn login(&self, email: &str) -> String {
        let reply = self
            .post_json(
                "/auth/magic-link",
                None,
                serde_json::json!({ "email": email }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{:?}", reply.body);

        let magic = self.sender.last_token();
        let reply = self
            .get(
                &format!("/auth/callback?token={}", urlencoding::encode(&magic)),
                None,
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{:?}", reply.body);

        reply.body["data"]["token"]
            .as_str()
            .expect("session token")
            .to_string()
    }

    /// Creates a project through the API and returns `(id, slug)`.
    pub async fn create_project(&self, token: &str, name: &str, slug: Option<&str>) -> (String, String) {
        let mut body = serde_json::json!({ "name": name });
        if let Some(slug) = slug {
            body["slug"] = Value::String(slug.to_string());
        }
        let reply = self.post_json("/api/v1/projects", Some(token), body).await;
        assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.body);

        let data = &reply.body["data"];
        (
            data["id"].as_str().expect("project id").to_string(),
            data["slug"].as_str().expect("project slug").to_string(),
        )
    }
}
