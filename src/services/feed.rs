use std::collections::HashMap;

use crate::error::Result;
use crate::models::account::{Account, AccountId};
use crate::models::post::{FeedEntry, PostId, PostRow};
use crate::render::{self, Markup};
use crate::repositories::post as post_repo;
use crate::sql::Sql;
use crate::state::AppState;

/// The page size used when the client supplies none (or a non-positive one).
const DEFAULT_LIMIT: i64 = 10;

/// Client-supplied pagination. Both values are untrusted integers and are
/// always bound as query parameters, never rendered into statement text.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeedOptions {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

fn page_window(opts: FeedOptions) -> (i64, i64) {
    let limit = match opts.limit {
        Some(n) if n > 0 => i64::from(n),
        _ => DEFAULT_LIMIT,
    };
    let offset = match opts.offset {
        Some(n) if n > 0 => i64::from(n),
        _ => 0,
    };
    (limit, offset)
}

/// Builds the visibility query: a post is visible iff it is public, or the
/// viewer wrote it, or the viewer follows its author.
///
/// With no viewer the last two disjuncts render as literal `FALSE`. A NULL
/// author satisfies neither comparison (SQL null semantics), so a post nobody
/// authored is only ever visible by being public. The friends slice reaches
/// this function exclusively through [`Account::friends`]; there is no public
/// path that accepts a caller-supplied friend list.
fn visible_posts_sql(
    viewer: Option<AccountId>,
    friends: &[AccountId],
    limit: i64,
    offset: i64,
) -> Sql {
    let is_author = match viewer {
        Some(aid) => Sql::lit("posts.author = ").bind(aid),
        None => Sql::lit("FALSE"),
    };
    let author_followed = if friends.is_empty() {
        Sql::lit("FALSE")
    } else {
        Sql::lit("posts.author IN (")
            .bind_list(friends.to_vec())
            .push(")")
    };

    Sql::lit(
        "SELECT posts.pid, posts.author, posts.body_html, posts.created, \
         accounts.display_name AS author_name, \
         accounts.display_name_html AS author_name_html, \
         accounts.public_url AS author_url \
         FROM posts \
         LEFT JOIN accounts ON posts.author = accounts.aid \
         WHERE posts.public OR (",
    )
    .append(is_author)
    .push(") OR (")
    .append(author_followed)
    .push(") ORDER BY posts.created ASC LIMIT ")
    .bind(limit)
    .push(" OFFSET ")
    .bind(offset)
}

/// Turns raw post rows into feed entries: linkify (best effort), then
/// sanitize (always), then resolve the author's display name.
///
/// A linkify failure is a display concern, not a feed failure: the original
/// body is kept, the failure goes to the log, and sanitization still runs on
/// the fallback.
fn assemble_entries(markup: &dyn Markup, posts: Vec<PostRow>) -> Vec<FeedEntry> {
    posts
        .into_iter()
        .map(|post| {
            let body = match markup.linkify(&post.body_html) {
                Ok(linked) => linked,
                Err(e) => {
                    tracing::warn!(pid = post.pid, "Linkify failed, keeping original body: {}", e);
                    post.body_html.clone()
                }
            };
            FeedEntry {
                pid: post.pid,
                author: post.author,
                author_name: render::display_name(
                    markup,
                    post.author_name.as_deref(),
                    post.author_name_html.as_deref(),
                ),
                author_url: post.author_url,
                body: markup.sanitize(&body),
                created: post.created,
                images: Vec::new(),
            }
        })
        .collect()
}

/// Attaches image URLs to their posts, preserving the image query's row
/// order. Posts with no rows keep an empty list.
fn collate_images(entries: &mut [FeedEntry], image_rows: Vec<(PostId, String)>) {
    let by_pid: HashMap<PostId, usize> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| (entry.pid, i))
        .collect();
    for (pid, url) in image_rows {
        if let Some(&i) = by_pid.get(&pid) {
            entries[i].images.push(url);
        }
    }
}

/// Fetches the page of posts `viewer` may see, assembled into client-ready
/// feed entries.
///
/// The connection checkout and the (memoized) friend fetch are independent
/// and run concurrently; the image fetch depends on the page's post ids and
/// is sequenced after it.
pub async fn get_visible_posts(
    state: &AppState,
    viewer: Option<&Account>,
    opts: FeedOptions,
) -> Result<Vec<FeedEntry>> {
    let (limit, offset) = page_window(opts);

    let (client, friends) = match viewer {
        Some(account) => {
            let (client, friends) = tokio::join!(state.db.get(), account.friends(&state.db));
            (client?, friends?.to_vec())
        }
        None => (state.db.get().await?, Vec::new()),
    };

    let rows = visible_posts_sql(viewer.map(|a| a.id), &friends, limit, offset)
        .query(&client)
        .await?;
    let posts = rows
        .iter()
        .map(post_repo::row_to_post)
        .collect::<Result<Vec<_>>>()?;

    let mut entries = assemble_entries(state.markup.as_ref(), posts);

    let pids = entries.iter().map(|e| e.pid).collect();
    let image_rows = post_repo::images_for(&client, pids).await?;
    collate_images(&mut entries, image_rows);

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::render::EscapingMarkup;
    use chrono::{TimeZone, Utc};

    /// A linkifier that always fails, for exercising the fallback path.
    struct BrokenLinkifier;

    impl Markup for BrokenLinkifier {
        fn sanitize(&self, html: &str) -> String {
            EscapingMarkup.sanitize(html)
        }

        fn linkify(&self, _html: &str) -> Result<String> {
            Err(AppError::Internal("linkifier exploded".to_string()))
        }
    }

    fn post(pid: PostId, author: Option<AccountId>, body: &str) -> PostRow {
        PostRow {
            pid,
            author,
            body_html: body.to_string(),
            created: Utc.with_ymd_and_hms(2018, 10, 12, 12, 0, pid as u32).unwrap(),
            author_name: Some("Abe".to_string()),
            author_name_html: None,
            author_url: None,
        }
    }

    #[test]
    fn anonymous_viewer_gets_only_the_public_disjunct() {
        let sql = visible_posts_sql(None, &[], 10, 0);
        let text = sql.text();
        assert!(text.contains("WHERE posts.public OR (FALSE) OR (FALSE)"));
        assert!(text.ends_with("ORDER BY posts.created ASC LIMIT $1 OFFSET $2"));
    }

    #[test]
    fn viewer_and_friends_become_parameters_not_text() {
        let sql = visible_posts_sql(Some(3563), &[3055, 2750], 10, 0);
        let text = sql.text();
        assert!(text.contains("posts.author = $1"));
        assert!(text.contains("posts.author IN ($2, $3)"));
        assert!(!text.contains("3563"));
        assert!(!text.contains("3055"));
    }

    #[test]
    fn a_viewer_with_no_followees_collapses_to_false() {
        let sql = visible_posts_sql(Some(3563), &[], 10, 0);
        assert!(sql.text().contains(") OR (FALSE)"));
    }

    #[test]
    fn pagination_defaults_when_unset_or_non_positive() {
        assert_eq!(page_window(FeedOptions::default()), (10, 0));
        assert_eq!(
            page_window(FeedOptions {
                limit: Some(0),
                offset: Some(0),
            }),
            (10, 0)
        );
        assert_eq!(
            page_window(FeedOptions {
                limit: Some(2),
                offset: Some(1),
            }),
            (2, 1)
        );
    }

    #[test]
    fn sanitization_runs_even_when_linkify_fails() {
        let rows = vec![post(1, Some(2750), "<script>alert(1)</script>Hi")];
        let entries = assemble_entries(&BrokenLinkifier, rows);
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].body.contains("<script>"));
        assert!(entries[0].body.contains("Hi"));
    }

    #[test]
    fn images_collate_in_row_order_and_default_to_empty() {
        let rows = vec![post(1, Some(2750), "a"), post(2, None, "b")];
        let mut entries = assemble_entries(&EscapingMarkup, rows);
        collate_images(
            &mut entries,
            vec![
                (1, "/user-uploads/first.png".to_string()),
                (1, "/user-uploads/second.png".to_string()),
                (9, "/user-uploads/orphan.png".to_string()),
            ],
        );
        assert_eq!(
            entries[0].images,
            vec!["/user-uploads/first.png", "/user-uploads/second.png"]
        );
        assert!(entries[1].images.is_empty());
    }

    #[test]
    fn author_display_name_falls_back_like_account_names() {
        let mut row = post(1, Some(3055), "hello");
        row.author_name = None;
        row.author_name_html = Some("Bee<script>x</script>".to_string());
        let entries = assemble_entries(&EscapingMarkup, vec![row]);
        let name = entries[0].author_name.as_deref().unwrap();
        assert!(name.starts_with("Bee"));
        assert!(!name.contains("<script>"));
    }
}
