use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::credentials::Credentials;
use crate::server::dto::{MessageResponse, SessionResponse};

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub error: Option<String>,
}

#[derive(Serialize)]
struct MagicLinkBody<'a> {
    email: &'a str,
}

impl ApiClient {
    pub fn new(creds: &Credentials) -> anyhow::Result<Self> {
        let mut client = Self::anonymous(&creds.server_url)?;
        client.token = Some(creds.token.clone());
        Ok(client)
    }

    /// A client for the routes that don't need a session yet.
    pub fn anonymous(server_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: server_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let url = format!("{}/api/v1{}", self.base_url, path);
        let resp = self.authorize(self.client.get(&url)).send()?;
        self.handle_response(resp)
    }

    pub fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> anyhow::Result<T> {
        let url = format!("{}/api/v1{}", self.base_url, path);
        let resp = self.authorize(self.client.post(&url)).json(body).send()?;
        self.handle_response(resp)
    }

    pub fn request_magic_link(&self, email: &str) -> anyhow::Result<String> {
        let url = format!("{}/auth/magic-link", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&MagicLinkBody { email })
            .send()?;
        let reply: MessageResponse = self.handle_response(resp)?;
        Ok(reply.message)
    }

    /// Trades a magic-link token for a session.
    pub fn redeem(&self, magic_token: &str) -> anyhow::Result<SessionResponse> {
        let url = format!("{}/auth/callback", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("token", magic_token)])
            .send()?;
        self.handle_response(resp)
    }

    pub fn logout(&self) -> anyhow::Result<()> {
        let url = format!("{}/auth/logout", self.base_url);
        let resp = self.authorize(self.client.post(&url)).send()?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(error_from(resp))
        }
    }

    fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::blocking::Response,
    ) -> anyhow::Result<T> {
        if resp.status().is_success() {
            let api_resp: ApiResponse<T> = resp.json()?;
            api_resp
                .data
                .ok_or_else(|| anyhow::anyhow!("Server returned an empty response"))
        } else {
            Err(error_from(resp))
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn error_from(resp: reqwest::blocking::Response) -> anyhow::Error {
    let status = resp.status();
    match resp.json::<ApiResponse<()>>() {
        Ok(api_resp) => anyhow::anyhow!(
            api_resp
                .error
                .unwrap_or_else(|| "Server error (no details provided)".into())
        ),
        Err(_) => anyhow::anyhow!("Server returned {status}"),
    }
}
