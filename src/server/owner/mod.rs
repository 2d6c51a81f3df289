mod account;
mod projects;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::server::AppState;

pub fn owner_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(account::get_me))
        // Projects
        .route("/projects", get(projects::list_projects))
        .route("/projects", post(projects::create_project))
        .route("/projects/{id}", get(projects::get_project))
        .route("/projects/{id}/signups", get(projects::list_signups))
        .route("/projects/{id}/link", get(projects::tracking_link))
}
