//! Magic-link login and session handling.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
    routing::{get, post},
};

use crate::auth::{
    RequireOwner, TokenValidationError, clear_session_cookie, issue_magic_link, redeem_magic_link,
    session_cookie,
};
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{CallbackParams, MagicLinkRequest, MessageResponse, SessionResponse};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};

const MAGIC_LINK_SENT: &str = "Check your email for the magic link!";

pub fn auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/magic-link", post(request_magic_link))
        .route("/callback", get(callback))
        .route("/logout", post(logout))
}

pub async fn request_magic_link(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<MagicLinkRequest>,
) -> impl IntoResponse {
    let (owner, raw_token) =
        match issue_magic_link(state.store.as_ref(), &req.email, state.magic_link_ttl) {
            Ok(issued) => issued,
            Err(Error::BadRequest(message)) => return Err(ApiError::bad_request(message)),
            Err(e) => {
                tracing::error!("Failed to issue magic link: {e}");
                return Err(ApiError::internal("Failed to issue magic link"));
            }
        };

    let link = format!(
        "{}/auth/callback?token={}",
        state.base_url(&headers),
        urlencoding::encode(&raw_token)
    );
    state
        .link_sender
        .send_magic_link(&owner.email, &link)
        .api_err("Failed to send magic link")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(MessageResponse {
        message: MAGIC_LINK_SENT.to_string(),
    })))
}

pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    let issued = redeem_magic_link(state.store.as_ref(), &params.token, state.session_ttl)
        .map_err(|e| match e {
            TokenValidationError::InvalidToken => ApiError::unauthorized("Invalid login link"),
            TokenValidationError::TokenExpired => ApiError::gone("Login link expired"),
            TokenValidationError::AlreadyUsed => ApiError::gone("Login link already used"),
            TokenValidationError::InternalError => ApiError::internal("Failed to sign in"),
        })?;

    tracing::info!(owner_id = %issued.owner.id, "owner signed in");

    let cookie = session_cookie(&issued.raw_token, state.session_ttl);
    let body = SessionResponse {
        token: issued.raw_token,
        owner: issued.owner,
        expires_at: issued.session.expires_at,
    };

    Ok::<_, ApiError>((
        [(SET_COOKIE, cookie)],
        Json(ApiResponse::success(body)),
    ))
}

pub async fn logout(
    auth: RequireOwner,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    state
        .store
        .delete_session(&auth.session.id)
        .api_err("Failed to sign out")?;

    Ok::<_, ApiError>((
        StatusCode::NO_CONTENT,
        [(SET_COOKIE, clear_session_cookie())],
    ))
}
