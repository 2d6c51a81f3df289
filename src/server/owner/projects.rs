use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::attribution;
use crate::auth::RequireOwner;
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{
    CreateProjectRequest, LinkParams, ProjectDetail, ProjectSummary, SOURCE_PRESETS, TrackingLink,
    public_path, tracking_url,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{generate_slug, validate_project_name, validate_slug};
use crate::types::{Project, Signup};

const SLUG_TAKEN: &str = "This slug is already taken. Please choose a different one.";

fn load_owned_project(
    state: &AppState,
    owner_id: &str,
    project_id: &str,
) -> Result<Project, ApiError> {
    state
        .store
        .get_owned_project(owner_id, project_id)
        .owner_err("Failed to get project")?
        .or_not_found("Project not found")
}

pub async fn list_projects(
    auth: RequireOwner,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let owner_id = &auth.owner.id;

    let projects = store
        .list_owned_projects(owner_id)
        .owner_err("Error loading projects")?;
    let signups = store
        .list_owner_signups(owner_id)
        .owner_err("Error loading projects")?;

    let mut by_project: HashMap<String, Vec<Signup>> = HashMap::new();
    for signup in signups {
        by_project
            .entry(signup.project_id.clone())
            .or_default()
            .push(signup);
    }

    let now = Utc::now();
    let summaries: Vec<ProjectSummary> = projects
        .into_iter()
        .map(|project| {
            let signups = by_project.remove(&project.id).unwrap_or_default();
            ProjectSummary::new(project, &signups, now)
        })
        .collect();

    Ok::<_, ApiError>(Json(ApiResponse::success(summaries)))
}

pub async fn create_project(
    auth: RequireOwner,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProjectRequest>,
) -> impl IntoResponse {
    let name = req.name.trim().to_string();
    validate_project_name(&name)?;

    let slug = match req.slug.as_deref().map(str::trim) {
        Some(slug) if !slug.is_empty() => slug.to_string(),
        _ => generate_slug(&name),
    };
    validate_slug(&slug)?;

    if !state
        .store
        .is_slug_available(&slug)
        .owner_err("Failed to check slug")?
    {
        return Err(ApiError::conflict(SLUG_TAKEN));
    }

    let project = Project {
        id: Uuid::new_v4().to_string(),
        name,
        slug,
        owner_id: auth.owner.id.clone(),
        created_at: Some(Utc::now()),
    };

    match state.store.create_project(&project) {
        Ok(()) => {}
        Err(Error::AlreadyExists) => return Err(ApiError::conflict(SLUG_TAKEN)),
        Err(e) => return Err(ApiError::internal(format!("Failed to create project: {e}"))),
    }

    tracing::info!(project_id = %project.id, slug = %project.slug, "project created");

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(project))))
}

pub async fn get_project(
    auth: RequireOwner,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let project = load_owned_project(&state, &auth.owner.id, &id)?;

    let signups = state
        .store
        .list_project_signups(&auth.owner.id, &project.id)
        .owner_err("Failed to list signups")?;

    let detail = ProjectDetail {
        public_path: public_path(&project.slug),
        attribution: attribution::aggregate(&signups),
        project,
    };

    Ok::<_, ApiError>(Json(ApiResponse::success(detail)))
}

pub async fn list_signups(
    auth: RequireOwner,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let project = load_owned_project(&state, &auth.owner.id, &id)?;

    let signups = state
        .store
        .list_project_signups(&auth.owner.id, &project.id)
        .owner_err("Failed to list signups")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(signups)))
}

pub async fn tracking_link(
    auth: RequireOwner,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<LinkParams>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let project = load_owned_project(&state, &auth.owner.id, &id)?;

    let source = match params.src.as_deref().map(str::trim) {
        Some(src) if !src.is_empty() => src.to_string(),
        _ => SOURCE_PRESETS[0].to_string(),
    };

    let link = TrackingLink {
        url: tracking_url(&state.base_url(&headers), &project.slug, &source),
        source,
        presets: SOURCE_PRESETS.iter().map(|s| s.to_string()).collect(),
    };

    Ok::<_, ApiError>(Json(ApiResponse::success(link)))
}
