use chrono::{Duration, Utc};
use uuid::Uuid;

use super::{TokenGenerator, TokenKind, parse_token};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{MagicLink, Owner, Session};

#[derive(Debug, PartialEq, Eq)]
pub enum TokenValidationError {
    InvalidToken,
    TokenExpired,
    AlreadyUsed,
    InternalError,
}

pub struct ValidatedSession {
    pub session: Session,
    pub owner: Owner,
}

pub struct IssuedSession {
    pub raw_token: String,
    pub session: Session,
    pub owner: Owner,
}

/// Owner emails are matched case-insensitively.
#[must_use]
pub fn normalize_owner_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Finds or creates the owner for `email` and issues a one-time login token.
/// Returns the owner and the raw token to embed in the link.
pub fn issue_magic_link(store: &dyn Store, email: &str, ttl: Duration) -> Result<(Owner, String)> {
    let email = normalize_owner_email(email);
    if email.is_empty() || !email.contains('@') {
        return Err(Error::BadRequest("A valid email address is required".into()));
    }

    let owner = match store.get_owner_by_email(&email)? {
        Some(owner) => owner,
        None => create_or_fetch_owner(store, email)?,
    };

    let generator = TokenGenerator::new();
    let (raw_token, lookup, hash) = generator.generate(TokenKind::MagicLink)?;
    let now = Utc::now();
    let link = MagicLink {
        id: Uuid::new_v4().to_string(),
        owner_id: owner.id.clone(),
        token_hash: hash,
        token_lookup: lookup,
        created_at: now,
        expires_at: now + ttl,
        consumed_at: None,
    };
    store.create_magic_link(&link)?;

    Ok((owner, raw_token))
}

/// Inserts a new owner, or returns the one a concurrent request created first.
fn create_or_fetch_owner(store: &dyn Store, email: String) -> Result<Owner> {
    let owner = Owner {
        id: Uuid::new_v4().to_string(),
        email,
        created_at: Utc::now(),
    };

    match store.create_owner(&owner) {
        Ok(()) => {
            tracing::info!(owner_id = %owner.id, "created owner");
            Ok(owner)
        }
        Err(Error::AlreadyExists) => store
            .get_owner_by_email(&owner.email)?
            .ok_or(Error::AlreadyExists),
        Err(e) => Err(e),
    }
}

/// Exchanges a login token for a new session. Each link works once.
pub fn redeem_magic_link(
    store: &dyn Store,
    raw_token: &str,
    session_ttl: Duration,
) -> std::result::Result<IssuedSession, TokenValidationError> {
    let (kind, lookup, _secret) =
        parse_token(raw_token).map_err(|_| TokenValidationError::InvalidToken)?;
    if kind != TokenKind::MagicLink {
        return Err(TokenValidationError::InvalidToken);
    }

    let link = store
        .get_magic_link_by_lookup(&lookup)
        .map_err(|_| TokenValidationError::InternalError)?
        .ok_or(TokenValidationError::InvalidToken)?;

    let generator = TokenGenerator::new();
    if !generator
        .verify(raw_token, &link.token_hash)
        .map_err(|_| TokenValidationError::InternalError)?
    {
        return Err(TokenValidationError::InvalidToken);
    }

    if link.expires_at < Utc::now() {
        return Err(TokenValidationError::TokenExpired);
    }

    if !store
        .consume_magic_link(&link.id)
        .map_err(|_| TokenValidationError::InternalError)?
    {
        return Err(TokenValidationError::AlreadyUsed);
    }

    let owner = store
        .get_owner(&link.owner_id)
        .map_err(|_| TokenValidationError::InternalError)?
        .ok_or(TokenValidationError::InvalidToken)?;

    let (raw_session, lookup, hash) = generator
        .generate(TokenKind::Session)
        .map_err(|_| TokenValidationError::InternalError)?;
    let now = Utc::now();
    let session = Session {
        id: Uuid::new_v4().to_string(),
        owner_id: owner.id.clone(),
        token_hash: hash,
        token_lookup: lookup,
        created_at: now,
        expires_at: now + session_ttl,
        last_used_at: None,
    };
    store
        .create_session(&session)
        .map_err(|_| TokenValidationError::InternalError)?;

    Ok(IssuedSession {
        raw_token: raw_session,
        session,
        owner,
    })
}

/// Validates a raw session token against the store.
pub fn validate_session(
    store: &dyn Store,
    raw_token: &str,
) -> std::result::Result<ValidatedSession, TokenValidationError> {
    let (kind, lookup, _secret) =
        parse_token(raw_token).map_err(|_| TokenValidationError::InvalidToken)?;
    if kind != TokenKind::Session {
        return Err(TokenValidationError::InvalidToken);
    }

    let session = store
        .get_session_by_lookup(&lookup)
        .map_err(|_| TokenValidationError::InternalError)?
        .ok_or(TokenValidationError::InvalidToken)?;

    let generator = TokenGenerator::new();
    if !generator
        .verify(raw_token, &session.token_hash)
        .map_err(|_| TokenValidationError::InternalError)?
    {
        return Err(TokenValidationError::InvalidToken);
    }

    if session.expires_at < Utc::now() {
        return Err(TokenValidationError::TokenExpired);
    }

    let owner = store
        .get_owner(&session.owner_id)
        .map_err(|_| TokenValidationError::InternalError)?
        .ok_or(TokenValidationError::InvalidToken)?;

    if let Err(e) = store.touch_session(&session.id) {
        tracing::warn!("Failed to update session last_used_at: {e}");
    }

    Ok(ValidatedSession { session, owner })
}

/// Extracts a session token from the Authorization header (Bearer) or,
/// failing that, from the `session` cookie.
pub fn extract_session_token<'a>(
    auth_header: Option<&'a str>,
    cookie_headers: impl Iterator<Item = &'a str>,
) -> Option<String> {
    if let Some(token) = auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        return Some(token.trim().to_string());
    }

    cookie_headers
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

pub const SESSION_COOKIE: &str = "session";

#[must_use]
pub fn session_cookie(raw_token: &str, ttl: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={raw_token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        ttl.num_seconds()
    )
}

#[must_use]
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0")
}
