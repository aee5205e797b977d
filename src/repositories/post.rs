use chrono::{DateTime, Utc};
use deadpool_postgres::Client;
use tokio_postgres::Row;

use crate::error::{AppError, Result};
use crate::models::account::AccountId;
use crate::models::post::{PostId, PostRow};
use crate::sql::Sql;

/// A helper function to map a result row to a `PostRow`.
pub(crate) fn row_to_post(row: &Row) -> Result<PostRow> {
    Ok(PostRow {
        pid: row
            .try_get("pid")
            .map_err(|_| AppError::UnexpectedShape("pid".to_string()))?,
        author: row
            .try_get("author")
            .map_err(|_| AppError::UnexpectedShape("author".to_string()))?,
        body_html: row
            .try_get("body_html")
            .map_err(|_| AppError::UnexpectedShape("body_html".to_string()))?,
        created: row
            .try_get("created")
            .map_err(|_| AppError::UnexpectedShape("created".to_string()))?,
        author_name: row
            .try_get("author_name")
            .map_err(|_| AppError::UnexpectedShape("author_name".to_string()))?,
        author_name_html: row
            .try_get("author_name_html")
            .map_err(|_| AppError::UnexpectedShape("author_name_html".to_string()))?,
        author_url: row
            .try_get("author_url")
            .map_err(|_| AppError::UnexpectedShape("author_url".to_string()))?,
    })
}

/// Fetches the image URLs attached to the given posts, in attachment order.
pub async fn images_for(client: &Client, pids: Vec<PostId>) -> Result<Vec<(PostId, String)>> {
    if pids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = Sql::lit("SELECT pid, url_path FROM post_resources WHERE pid IN (")
        .bind_list(pids)
        .push(") ORDER BY rid")
        .query(client)
        .await?;
    rows.iter()
        .map(|row| {
            let pid = row
                .try_get("pid")
                .map_err(|_| AppError::UnexpectedShape("pid".to_string()))?;
            let url = row
                .try_get("url_path")
                .map_err(|_| AppError::UnexpectedShape("url_path".to_string()))?;
            Ok((pid, url))
        })
        .collect()
}

/// Inserts a post and returns its id. `created` is overridable so callers
/// (and fixtures) can pin timestamps.
pub async fn insert_post(
    client: &Client,
    author: Option<AccountId>,
    public: bool,
    body_html: &str,
    created: Option<DateTime<Utc>>,
) -> Result<PostId> {
    let mut sql = Sql::lit("INSERT INTO posts (author, public, body_html, created) VALUES (")
        .bind(author)
        .push(", ")
        .bind(public)
        .push(", ")
        .bind(body_html.to_string())
        .push(", ");
    sql = match created {
        Some(at) => sql.bind(at),
        None => sql.push("NOW()"),
    };
    let rows = sql.push(") RETURNING pid").query(client).await?;
    let row = rows
        .first()
        .ok_or_else(|| AppError::UnexpectedShape("pid".to_string()))?;
    row.try_get("pid")
        .map_err(|_| AppError::UnexpectedShape("pid".to_string()))
}

/// Attaches image URLs to a post as one multi-row insert.
pub async fn attach_images(client: &Client, pid: PostId, urls: &[String]) -> Result<()> {
    if urls.is_empty() {
        return Ok(());
    }
    let mut sql = Sql::lit("INSERT INTO post_resources (pid, url_path) VALUES ");
    for (i, url) in urls.iter().enumerate() {
        if i > 0 {
            sql = sql.push(", ");
        }
        sql = sql.push("(").bind(pid).push(", ").bind(url.clone()).push(")");
    }
    sql.execute(client).await?;
    Ok(())
}
