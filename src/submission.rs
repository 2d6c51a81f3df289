//! Public signup submission.
//!
//! Visitors only ever learn whether their signup went through. Validation
//! failures, duplicate emails, rate limiting and store errors all produce the
//! same outcome so the response reveals neither limits nor existing emails.

use serde::Serialize;
use tracing::{info, warn};

use crate::store::{SignupProcedure, SignupSubmission};
use crate::types::DEFAULT_SOURCE;

pub const SIGNUP_SUCCESS_MESSAGE: &str = "Spot reserved.";
pub const SIGNUP_FAILURE_MESSAGE: &str = "Unable to verify signup. Please try again later.";

/// A visitor's signup as it arrives at the public endpoint.
#[derive(Debug, Clone, Copy)]
pub struct SignupRequest<'a> {
    pub project_id: &'a str,
    pub email: &'a str,
    /// The `src` query parameter of the link the visitor followed.
    pub source: Option<&'a str>,
    pub ip_address: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignupOutcome {
    Success,
    Failed,
}

impl SignupOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, SignupOutcome::Success)
    }

    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            SignupOutcome::Success => SIGNUP_SUCCESS_MESSAGE,
            SignupOutcome::Failed => SIGNUP_FAILURE_MESSAGE,
        }
    }
}

/// `src` value to record; a missing or empty parameter means a direct visit.
#[must_use]
pub fn resolve_source(src: Option<&str>) -> String {
    match src {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => DEFAULT_SOURCE.to_string(),
    }
}

#[must_use]
pub fn prepare(request: SignupRequest<'_>) -> SignupSubmission {
    SignupSubmission {
        project_id: request.project_id.to_string(),
        email: request.email.trim().to_string(),
        source: resolve_source(request.source),
        ip_address: request.ip_address.map(str::to_string),
    }
}

/// Runs the signup procedure and collapses its result to a visitor-safe outcome.
pub fn submit<P: SignupProcedure + ?Sized>(procedure: &P, request: SignupRequest<'_>) -> SignupOutcome {
    let submission = prepare(request);

    match procedure.submit_signup(&submission) {
        Ok(reply) if reply.success => {
            info!(
                project_id = %submission.project_id,
                source = %submission.source,
                "signup recorded"
            );
            SignupOutcome::Success
        }
        Ok(reply) => {
            info!(
                project_id = %submission.project_id,
                reason = reply.reason.map_or("unspecified", |r| r.as_str()),
                "signup rejected"
            );
            SignupOutcome::Failed
        }
        Err(e) => {
            warn!(project_id = %submission.project_id, "signup procedure failed: {e}");
            SignupOutcome::Failed
        }
    }
}
