use axum::{Json, response::IntoResponse};

use crate::auth::RequireOwner;
use crate::server::response::ApiResponse;

pub async fn get_me(auth: RequireOwner) -> impl IntoResponse {
    Json(ApiResponse::success(auth.owner))
}
