mod server;

pub use server::{MAX_DURATION_SECS, ServerConfig, SignupLimits};
