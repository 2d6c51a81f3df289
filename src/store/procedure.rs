//! The `submit_signup` procedure contract.
//!
//! The procedure is the only write path for signups. Its reply carries a
//! reason for rejections so the server can log it; callers facing anonymous
//! visitors must only look at `success`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SignupLimits;
use crate::error::Result;
use crate::types::SignupAttempt;

const MAX_EMAIL_LEN: usize = 254;
const MAX_SOURCE_LEN: usize = 100;

/// Arguments of `submit_signup`, named after the procedure's parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupSubmission {
    #[serde(rename = "p_project_id")]
    pub project_id: String,
    #[serde(rename = "p_email")]
    pub email: String,
    #[serde(rename = "p_source")]
    pub source: String,
    #[serde(rename = "p_ip_address")]
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    ProjectNotFound,
    InvalidEmail,
    InvalidSource,
    RateLimited,
    Duplicate,
}

impl RejectReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::ProjectNotFound => "project_not_found",
            RejectReason::InvalidEmail => "invalid_email",
            RejectReason::InvalidSource => "invalid_source",
            RejectReason::RateLimited => "rate_limited",
            RejectReason::Duplicate => "duplicate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

impl SubmitReply {
    #[must_use]
    pub fn accepted() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    #[must_use]
    pub fn rejected(reason: RejectReason) -> Self {
        Self {
            success: false,
            reason: Some(reason),
        }
    }
}

/// Server-side signup ingestion: validation, rate limiting, duplicate
/// rejection and the insert, as one atomic step.
pub trait SignupProcedure: Send + Sync {
    fn submit_signup(&self, submission: &SignupSubmission) -> Result<SubmitReply>;
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    if email.len() < 3 || email.len() > MAX_EMAIL_LEN {
        return false;
    }
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

pub(crate) fn is_valid_source(source: &str) -> bool {
    !source.is_empty() && source.len() <= MAX_SOURCE_LEN
}

/// Computes the ledger row after one more attempt at `now` and whether the
/// attempt is allowed. The window rolls from the most recent attempt.
pub(crate) fn next_attempt(
    existing: Option<&SignupAttempt>,
    project_id: &str,
    ip_address: &str,
    now: DateTime<Utc>,
    limits: SignupLimits,
) -> (SignupAttempt, bool) {
    let window = Duration::seconds(limits.window_secs);

    match existing {
        Some(prev) if now - prev.last_attempt_at < window => {
            let allowed = prev.attempt_count < limits.max_attempts;
            let row = SignupAttempt {
                project_id: project_id.to_string(),
                ip_address: ip_address.to_string(),
                attempt_count: prev.attempt_count.saturating_add(1),
                last_attempt_at: now,
            };
            (row, allowed)
        }
        _ => {
            let row = SignupAttempt {
                project_id: project_id.to_string(),
                ip_address: ip_address.to_string(),
                attempt_count: 1,
                last_attempt_at: now,
            };
            (row, true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_attempts: u32, window_secs: i64) -> SignupLimits {
        SignupLimits {
            max_attempts,
            window_secs,
        }
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("founder@company.com"));
        assert!(is_valid_email("a+tag@b"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@company.com"));
        assert!(!is_valid_email("founder@"));
        assert!(!is_valid_email("two@@ats.com"));
        assert!(!is_valid_email("spa ce@company.com"));
        assert!(!is_valid_email(&format!("{}@x.io", "a".repeat(260))));
    }

    #[test]
    fn test_source_validation() {
        assert!(is_valid_source("twitter"));
        assert!(!is_valid_source(""));
        assert!(!is_valid_source(&"s".repeat(101)));
    }

    #[test]
    fn test_first_attempt_allowed() {
        let now = Utc::now();
        let (row, allowed) = next_attempt(None, "p1", "10.0.0.1", now, limits(1, 60));
        assert!(allowed);
        assert_eq!(row.attempt_count, 1);
        assert_eq!(row.last_attempt_at, now);
    }

    #[test]
    fn test_second_attempt_inside_window_rejected() {
        let start = Utc::now();
        let (first, _) = next_attempt(None, "p1", "10.0.0.1", start, limits(1, 60));
        let (second, allowed) = next_attempt(
            Some(&first),
            "p1",
            "10.0.0.1",
            start + Duration::seconds(30),
            limits(1, 60),
        );
        assert!(!allowed);
        assert_eq!(second.attempt_count, 2);
    }

    #[test]
    fn test_attempt_after_window_resets() {
        let start = Utc::now();
        let (first, _) = next_attempt(None, "p1", "10.0.0.1", start, limits(1, 60));
        let (second, allowed) = next_attempt(
            Some(&first),
            "p1",
            "10.0.0.1",
            start + Duration::seconds(61),
            limits(1, 60),
        );
        assert!(allowed);
        assert_eq!(second.attempt_count, 1);
    }

    #[test]
    fn test_higher_limit_allows_several_attempts() {
        let start = Utc::now();
        let l = limits(3, 600);
        let (a, ok_a) = next_attempt(None, "p1", "ip", start, l);
        let (b, ok_b) = next_attempt(Some(&a), "p1", "ip", start + Duration::seconds(1), l);
        let (c, ok_c) = next_attempt(Some(&b), "p1", "ip", start + Duration::seconds(2), l);
        let (_, ok_d) = next_attempt(Some(&c), "p1", "ip", start + Duration::seconds(3), l);
        assert!(ok_a && ok_b && ok_c);
        assert!(!ok_d);
    }

    #[test]
    fn test_reply_serializes_like_procedure_result() {
        let json = serde_json::to_value(SubmitReply::accepted()).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true }));

        let json = serde_json::to_value(SubmitReply::rejected(RejectReason::RateLimited)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["reason"], "rate_limited");
    }
}
