mod auth;
pub mod dto;
mod owner;
mod public;
pub mod response;
mod router;
pub mod validation;

pub use auth::auth_router;
pub use owner::owner_router;
pub use public::public_router;
pub use router::{AppState, create_router};
