use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{
        HeaderValue, StatusCode,
        header::{ACCEPT, AUTHORIZATION, COOKIE, WWW_AUTHENTICATE},
        request::Parts,
    },
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;

use super::helpers::{TokenValidationError, extract_session_token, validate_session};
use crate::server::AppState;
use crate::types::{Owner, Session};

/// Extractor that requires a signed-in owner. The identity lives only for the
/// request it was extracted from.
pub struct RequireOwner {
    pub session: Session,
    pub owner: Owner,
}

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidToken,
    TokenExpired,
    /// Browsers are sent to the login page instead of getting a 401.
    LoginRedirect(String),
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::LoginRedirect(url) => return Redirect::to(&url).into_response(),
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid session"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Session expired"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "data": null, "error": message });

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"waitlist\""),
            );
        }

        response
    }
}

fn wants_html(parts: &Parts) -> bool {
    parts
        .headers
        .get(ACCEPT)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

impl FromRequestParts<Arc<AppState>> for RequireOwner {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());
        let cookies = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok());

        let result = match extract_session_token(auth_header, cookies) {
            Some(raw_token) => validate_session(state.store.as_ref(), &raw_token).map_err(
                |e| match e {
                    TokenValidationError::InvalidToken | TokenValidationError::AlreadyUsed => {
                        AuthError::InvalidToken
                    }
                    TokenValidationError::TokenExpired => AuthError::TokenExpired,
                    TokenValidationError::InternalError => AuthError::InternalError,
                },
            ),
            None => Err(AuthError::MissingAuth),
        };

        match result {
            Ok(validated) => Ok(RequireOwner {
                session: validated.session,
                owner: validated.owner,
            }),
            Err(AuthError::InternalError) => Err(AuthError::InternalError),
            Err(_) if wants_html(parts) => Err(AuthError::LoginRedirect(state.login_url.clone())),
            Err(e) => Err(e),
        }
    }
}
