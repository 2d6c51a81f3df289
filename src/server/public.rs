//! Anonymous routes behind a project's public slug.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};

use crate::server::AppState;
use crate::server::dto::{PublicProject, SignupForm, SignupResponse, SourceParams};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::submission::{self, SIGNUP_FAILURE_MESSAGE, SignupRequest};
use crate::types::Project;

pub fn public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{slug}", get(get_project))
        .route("/{slug}/signups", post(create_signup))
}

fn resolve_slug(state: &AppState, slug: &str) -> Result<Project, ApiError> {
    state
        .store
        .get_project_by_slug(slug)
        .api_err("Failed to load project")?
        .or_not_found("Project not found")
}

pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    let project = resolve_slug(&state, &slug)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(PublicProject {
        id: project.id,
        name: project.name,
    })))
}

pub async fn create_signup(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(params): Query<SourceParams>,
    headers: HeaderMap,
    form: Result<Json<SignupForm>, JsonRejection>,
) -> impl IntoResponse {
    let project = state
        .store
        .get_project_by_slug(&slug)
        .map_err(|e| {
            tracing::warn!("signup slug lookup failed: {e}");
            ApiError::bad_request(SIGNUP_FAILURE_MESSAGE)
        })?
        .or_not_found("Project not found")?;

    // A malformed body is reported like any other rejected signup.
    let Ok(Json(form)) = form else {
        return Err(ApiError::bad_request(SIGNUP_FAILURE_MESSAGE));
    };

    let ip_address = state.client_ip(&headers);

    let outcome = submission::submit(
        state.store.as_ref(),
        SignupRequest {
            project_id: &project.id,
            email: &form.email,
            source: params.src.as_deref(),
            ip_address: ip_address.as_deref(),
        },
    );

    if !outcome.is_success() {
        return Err(ApiError::bad_request(outcome.message()));
    }

    Ok::<_, ApiError>((
        StatusCode::CREATED,
        Json(ApiResponse::success(SignupResponse {
            status: outcome,
            message: outcome.message(),
        })),
    ))
}
