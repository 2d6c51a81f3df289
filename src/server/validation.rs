use crate::server::response::ApiError;

const MAX_PROJECT_NAME_LEN: usize = 100;
const MAX_SLUG_LEN: usize = 64;

/// Derives a slug from a project name: lowercase, runs of anything outside
/// `[a-z0-9]` collapse to a single hyphen, no hyphen at either end.
#[must_use]
pub fn generate_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

pub fn validate_slug(slug: &str) -> Result<(), ApiError> {
    if slug.is_empty() {
        return Err(ApiError::bad_request("Slug cannot be empty"));
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(ApiError::bad_request(format!(
            "Slug cannot exceed {MAX_SLUG_LEN} characters"
        )));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ApiError::bad_request(
            "Slug can only contain lowercase letters, digits, and hyphens",
        ));
    }
    Ok(())
}

pub fn validate_project_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::bad_request("Project name cannot be empty"));
    }
    if name.chars().count() > MAX_PROJECT_NAME_LEN {
        return Err(ApiError::bad_request(format!(
            "Project name cannot exceed {MAX_PROJECT_NAME_LEN} characters"
        )));
    }
    Ok(())
}
