mod delivery;
mod helpers;
mod middleware;
mod token;

pub use delivery::{LinkSender, LogLinkSender};
pub use helpers::{
    IssuedSession, SESSION_COOKIE, TokenValidationError, ValidatedSession, clear_session_cookie,
    extract_session_token, issue_magic_link, normalize_owner_email, redeem_magic_link,
    session_cookie, validate_session,
};
pub use middleware::{AuthError, RequireOwner};
pub use token::{TokenGenerator, TokenKind, parse_token};
