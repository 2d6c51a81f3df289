use inquire::Text;

use super::credentials::{Credentials, delete_credentials, load_credentials, save_credentials};
use super::http_client::ApiClient;
use crate::auth::{TokenKind, parse_token};
use crate::types::Owner;

fn normalize_server_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');

    // Strip trailing API paths to avoid duplication when constructing request URLs
    let url = url
        .trim_end_matches("/api/v1")
        .trim_end_matches("/api")
        .trim_end_matches('/');

    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }

    if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
        format!("http://{}", url)
    } else {
        format!("https://{}", url)
    }
}

/// Accepts either the full link from the email or the bare token.
fn extract_magic_token(input: &str) -> String {
    let input = input.trim();
    let Some((_, query)) = input.split_once('?') else {
        return input.to_string();
    };

    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "token")
        .map(|(_, value)| {
            urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
        .unwrap_or_else(|| input.to_string())
}

fn required(prompt: &str, message: &'static str) -> anyhow::Result<String> {
    let value = Text::new(prompt)
        .with_validator(move |input: &str| {
            if input.trim().is_empty() {
                Ok(inquire::validator::Validation::Invalid(message.into()))
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()?;
    Ok(value)
}

fn session_from_token(server_url: &str, token: String) -> anyhow::Result<Credentials> {
    match parse_token(&token) {
        Ok((TokenKind::Session, _, _)) => Ok(Credentials {
            server_url: server_url.to_string(),
            token,
        }),
        Ok((TokenKind::MagicLink, _, _)) => {
            let client = ApiClient::anonymous(server_url)?;
            let session = client.redeem(&token)?;
            Ok(Credentials {
                server_url: server_url.to_string(),
                token: session.token,
            })
        }
        Err(_) => anyhow::bail!(
            "Invalid token format. Expected a login link or a token starting with 'wlm_' or 'wls_'"
        ),
    }
}

pub fn run_auth_login(
    server: Option<String>,
    email: Option<String>,
    token: Option<String>,
    non_interactive: bool,
) -> anyhow::Result<()> {
    let server = if let Some(s) = server {
        if s.trim().is_empty() {
            anyhow::bail!("Server URL cannot be empty");
        }
        s
    } else if non_interactive {
        anyhow::bail!("--server is required in non-interactive mode");
    } else {
        required("Server URL:", "Server URL is required")?
    };

    let server_url = normalize_server_url(&server);

    let token = if let Some(t) = token {
        extract_magic_token(&t)
    } else if non_interactive {
        anyhow::bail!("--token is required in non-interactive mode");
    } else {
        let email = match email {
            Some(e) => e,
            None => required("Email:", "Email is required")?,
        };
        let client = ApiClient::anonymous(&server_url)?;
        let message = client.request_magic_link(&email)?;
        println!("{message}");

        let pasted = Text::new("Login link:")
            .with_placeholder("paste the link or wlm_... token")
            .prompt()?;
        extract_magic_token(&pasted)
    };

    let creds = session_from_token(&server_url, token)?;

    let client = ApiClient::new(&creds)?;
    let owner: Owner = client.get("/me")?;

    save_credentials(&creds)?;

    println!();
    println!("Logged in to {} as {}", server_url, owner.email);
    println!();

    Ok(())
}

pub fn run_auth_logout() -> anyhow::Result<()> {
    if let Ok(creds) = load_credentials() {
        let revoked = ApiClient::new(&creds).and_then(|client| client.logout());
        if let Err(e) = revoked {
            tracing::warn!("Could not end the session on the server: {e}");
        }
    }

    if delete_credentials()? {
        println!();
        println!("Logged out successfully.");
        println!();
    } else {
        println!();
        println!("No credentials found.");
        println!();
    }
    Ok(())
}
