use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::http::{HeaderMap, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};
use chrono::Duration;

use super::auth::auth_router;
use super::owner::owner_router;
use super::public::public_router;
use crate::auth::{LinkSender, LogLinkSender};
use crate::config::ServerConfig;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub link_sender: Arc<dyn LinkSender>,
    /// Public base URL for external access. Used for tracking and login links.
    pub public_base_url: Option<String>,
    /// Read the visitor IP from `X-Forwarded-For`.
    pub trust_forwarded_for: bool,
    pub login_url: String,
    pub magic_link_ttl: Duration,
    pub session_ttl: Duration,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: &ServerConfig) -> Self {
        Self {
            store,
            link_sender: Arc::new(LogLinkSender),
            public_base_url: config
                .public_base_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string()),
            trust_forwarded_for: config.trust_forwarded_for,
            login_url: config.login_url.clone(),
            magic_link_ttl: Duration::seconds(config.magic_link_ttl_secs),
            session_ttl: Duration::seconds(config.session_ttl_secs),
        }
    }

    #[must_use]
    pub fn with_link_sender(mut self, sender: Arc<dyn LinkSender>) -> Self {
        self.link_sender = sender;
        self
    }

    /// Base URL for links handed out to people, without a trailing slash.
    #[must_use]
    pub fn base_url(&self, headers: &HeaderMap) -> String {
        match &self.public_base_url {
            Some(url) => url.clone(),
            None => get_host_from_headers(headers),
        }
    }

    /// The visitor IP, when the deployment sits behind a trusted proxy.
    #[must_use]
    pub fn client_ip(&self, headers: &HeaderMap) -> Option<String> {
        if !self.trust_forwarded_for {
            return None;
        }
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
    }
}

#[must_use]
fn get_host_from_headers(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");

    format!("{scheme}://{host}")
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/p", public_router())
        .nest("/auth", auth_router())
        .nest("/api/v1", owner_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
