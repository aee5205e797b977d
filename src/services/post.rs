use crate::error::{AppError, Result};
use crate::models::account::Account;
use crate::models::post::PostId;
use crate::repositories::post as post_repo;
use crate::state::AppState;

/// Reduces a client-supplied image reference to a root-relative URL path.
///
/// Any scheme/authority prefix is discarded and `.`/`..` segments are
/// resolved against the site root, so a crafted path cannot name an ancestor
/// directory. Paths that resolve to nothing are dropped.
fn descendant_path(raw: &str) -> Option<String> {
    let path = match raw.find("://") {
        Some(i) => {
            let rest = &raw[i + 3..];
            match rest.find('/') {
                Some(j) => &rest[j..],
                None => "/",
            }
        }
        None => raw,
    };
    let path = path.split(['?', '#']).next().unwrap_or("");

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(format!("/{}", segments.join("/")))
    }
}

/// Commits a new post with its attached images.
///
/// Anonymous authors may only post publicly. Image references are normalized
/// to descendant URL paths before being bound; the body is stored as-is and
/// sanitized at display time, never at rest.
pub async fn submit_post(
    state: &AppState,
    author: Option<&Account>,
    public: bool,
    body_html: &str,
    image_urls: &[String],
) -> Result<PostId> {
    if !public && author.is_none() {
        return Err(AppError::Validation(
            "Cannot post privately and anonymously".to_string(),
        ));
    }

    let images: Vec<String> = image_urls
        .iter()
        .filter_map(|url| descendant_path(url))
        .collect();

    let client = state.db.get().await?;
    let pid = post_repo::insert_post(&client, author.map(|a| a.id), public, body_html, None).await?;
    post_repo::attach_images(&client, pid, &images).await?;

    tracing::info!(pid, public, "Post committed");
    Ok(pid)
}
