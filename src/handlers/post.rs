use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::middleware_layer::session::CurrentAccount;
use crate::services::post as post_service;
use crate::state::AppState;

/// The request payload for creating a post.
#[derive(Deserialize)]
pub struct NewPostRequest {
    pub body: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Creates a new post with optional attached images.
#[axum::debug_handler]
pub async fn create_post(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentAccount>,
    Json(req): Json<NewPostRequest>,
) -> Result<Response> {
    if req.body.is_empty() {
        return Err(AppError::Validation("Post body must not be empty".to_string()));
    }

    let pid = post_service::submit_post(
        &state,
        current.0.as_deref(),
        req.public,
        &req.body,
        &req.images,
    )
    .await?;

    let response = sonic_rs::to_string(&sonic_rs::json!({
        "pid": pid,
        "message": "Posted"
    }))
    .unwrap_or_else(|_| r#"{"message":"Posted"}"#.to_string());

    Ok((StatusCode::CREATED, response).into_response())
}
