use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::account::AccountId;

/// A post identifier.
pub type PostId = i32;

/// A post row joined with its author's display columns, straight from storage.
#[derive(Debug, Clone)]
pub struct PostRow {
    pub pid: PostId,
    /// The authoring account. `None` authors nothing: a null author can never
    /// satisfy the "own post" or "followed author" visibility checks.
    pub author: Option<AccountId>,
    pub body_html: String,
    pub created: DateTime<Utc>,
    pub author_name: Option<String>,
    pub author_name_html: Option<String>,
    pub author_url: Option<String>,
}

/// A client-ready feed entry: sanitized body, resolved author display fields,
/// and attached images in attachment order.
#[derive(Debug, Serialize)]
pub struct FeedEntry {
    pub pid: PostId,
    pub author: Option<AccountId>,
    pub author_name: Option<String>,
    pub author_url: Option<String>,
    pub body: String,
    pub created: DateTime<Utc>,
    pub images: Vec<String>,
}
