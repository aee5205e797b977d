use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::middleware_layer::session::CurrentAccount;
use crate::services::feed::{self as feed_service, FeedOptions};
use crate::state::AppState;

/// The query parameters for the feed. Client-controlled; passed to the core
/// as integers only.
#[derive(Deserialize)]
pub struct FeedQuery {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

/// Serves the posts the current viewer may see.
#[axum::debug_handler]
pub async fn feed(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentAccount>,
    Query(query): Query<FeedQuery>,
) -> Result<Response> {
    let entries = feed_service::get_visible_posts(
        &state,
        current.0.as_deref(),
        FeedOptions {
            limit: query.limit,
            offset: query.offset,
        },
    )
    .await?;

    let response = sonic_rs::to_string(&entries)
        .map_err(|e| AppError::Internal(format!("Feed serialization failed: {}", e)))?;

    Ok((StatusCode::OK, response).into_response())
}
