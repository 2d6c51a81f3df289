use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attribution::{self, Attribution};
use crate::submission::SignupOutcome;
use crate::types::{Owner, Project, Signup};

/// Sources offered when building a tracking link.
pub const SOURCE_PRESETS: [&str; 4] = ["twitter", "linkedin", "newsletter", "producthunt"];

#[derive(Debug, Deserialize)]
pub struct MagicLinkRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub owner: Owner,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

/// What an anonymous visitor may learn about a project.
#[derive(Debug, Serialize)]
pub struct PublicProject {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SourceParams {
    #[serde(default)]
    pub src: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub status: SignupOutcome,
    pub message: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LastSignup {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub ago: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: Project,
    pub public_path: String,
    pub signup_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_signup: Option<LastSignup>,
}

impl ProjectSummary {
    /// `signups` must be this project's signups only.
    #[must_use]
    pub fn new(project: Project, signups: &[Signup], now: DateTime<Utc>) -> Self {
        let last_signup = attribution::most_recent(signups).map(|s| LastSignup {
            source: attribution::normalize_source(Some(&s.source)).to_string(),
            created_at: s.created_at,
            ago: time_ago(s.created_at, now),
        });

        Self {
            public_path: public_path(&project.slug),
            project,
            signup_count: signups.len(),
            last_signup,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub public_path: String,
    pub attribution: Attribution<Signup>,
}

#[derive(Debug, Deserialize)]
pub struct LinkParams {
    #[serde(default)]
    pub src: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackingLink {
    pub url: String,
    pub source: String,
    pub presets: Vec<String>,
}

#[must_use]
pub fn public_path(slug: &str) -> String {
    format!("/p/{slug}")
}

#[must_use]
pub fn tracking_url(base_url: &str, slug: &str, source: &str) -> String {
    format!(
        "{base_url}{}?src={}",
        public_path(slug),
        urlencoding::encode(source)
    )
}

/// Coarse relative time for dashboard listings.
#[must_use]
pub fn time_ago(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(at) = at else {
        return "unknown time".to_string();
    };

    let seconds = (now - at).num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    format!("{}d ago", hours / 24)
}
