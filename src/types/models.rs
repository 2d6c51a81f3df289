use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source recorded when a signup link carries no `src` parameter.
pub const DEFAULT_SOURCE: &str = "direct";

/// An account that owns projects. Created on first magic-link login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// A tracked waitlist, reachable publicly at `/p/{slug}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub owner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// One visitor's email capture. `source` is fixed when the row is inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signup {
    pub id: String,
    pub project_id: String,
    pub email: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Rate-limit ledger row, keyed by `(project_id, ip_address)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupAttempt {
    pub project_id: String,
    pub ip_address: String,
    pub attempt_count: u32,
    pub last_attempt_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagicLink {
    pub id: String,
    pub owner_id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub owner_id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}
