//! End-to-end checks against a real PostgreSQL instance, driven by the canned
//! fixture data. Each test resets the schema, so they serialize on one gate.
//!
//! Set `TEST_DATABASE_URL` to run these; without it every test skips itself.

use std::sync::LazyLock;
use tokio::sync::{Mutex, MutexGuard};

use trellis::config::Config;
use trellis::error::AppError;
use trellis::models::account::Account;
use trellis::schema;
use trellis::services::feed::{self, FeedOptions};
use trellis::services::post as post_service;
use trellis::services::session;
use trellis::sql::Sql;
use trellis::state::AppState;

const ABE: i32 = 2750;
const BEF: i32 = 3055;
const DEB: i32 = 3563;
const FAE: i32 = 4014;

static DB_GATE: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

fn test_state() -> Option<AppState> {
    let database_url = std::env::var("TEST_DATABASE_URL").ok()?;
    let config = Config {
        database_url,
        port: 0,
        session_ttl_secs: 3600,
    };
    Some(AppState::new(&config).expect("pool construction"))
}

async fn with_fixture() -> Option<(AppState, MutexGuard<'static, ()>)> {
    let state = test_state()?;
    let gate = DB_GATE.lock().await;
    schema::reset_schema_with_fixture_data(&state.db)
        .await
        .expect("fixture reset");
    Some((state, gate))
}

/// Binds a session nonce to an account and resolves it, the way the
/// (out-of-scope) login handler would.
async fn login(state: &AppState, aid: i32) -> Account {
    let nonce = format!("{:032x}", aid as u128);
    let client = state.db.get().await.unwrap();
    Sql::lit("INSERT INTO sessions (session_nonce, aid) VALUES (")
        .bind(nonce.clone())
        .push(", ")
        .bind(aid)
        .push(") ON CONFLICT (session_nonce) DO UPDATE SET aid = EXCLUDED.aid, created = NOW()")
        .execute(&client)
        .await
        .unwrap();
    session::resolve_session(state, &nonce)
        .await
        .unwrap()
        .expect("resolved account")
}

async fn visible_pids(state: &AppState, viewer: Option<&Account>, opts: FeedOptions) -> Vec<i32> {
    feed::get_visible_posts(state, viewer, opts)
        .await
        .unwrap()
        .iter()
        .map(|entry| entry.pid)
        .collect()
}

async fn count(state: &AppState, table: &str) -> i64 {
    let client = state.db.get().await.unwrap();
    let rows = Sql::lit("SELECT count(*) AS n FROM \"")
        .append(Sql::ident(table).unwrap())
        .push("\"")
        .query(&client)
        .await
        .unwrap();
    rows[0].get("n")
}

#[tokio::test]
async fn anonymous_viewer_sees_only_public_posts() {
    let Some((state, _gate)) = with_fixture().await else {
        eprintln!("skipping: TEST_DATABASE_URL not set");
        return;
    };

    let pids = visible_pids(&state, None, FeedOptions::default()).await;
    assert_eq!(pids, vec![1, 2, 3, 5, 6]);
}

#[tokio::test]
async fn visibility_follows_the_unilateral_edge() {
    let Some((state, _gate)) = with_fixture().await else {
        eprintln!("skipping: TEST_DATABASE_URL not set");
        return;
    };

    // Deb follows Bef, so she sees Bef's private post 7 on top of her own
    // private post 4 and the public posts.
    let deb = login(&state, DEB).await;
    assert_eq!(deb.friends(&state.db).await.unwrap(), &[BEF][..]);
    let pids = visible_pids(&state, Some(&deb), FeedOptions::default()).await;
    assert_eq!(pids, vec![1, 2, 3, 4, 5, 6, 7]);

    // Bef follows Abe but Abe gets nothing from that edge: Abe still cannot
    // see Bef's private posts, because only Abe's own outgoing edges count.
    let abe = login(&state, ABE).await;
    let pids = visible_pids(&state, Some(&abe), FeedOptions::default()).await;
    assert_eq!(pids, vec![1, 2, 3, 5, 6]);

    // Fae follows only Abe; her own posts are already public.
    let fae = login(&state, FAE).await;
    assert_eq!(fae.friends(&state.db).await.unwrap(), &[ABE][..]);
    let pids = visible_pids(&state, Some(&fae), FeedOptions::default()).await;
    assert_eq!(pids, vec![1, 2, 3, 5, 6]);
}

#[tokio::test]
async fn pagination_windows_the_ordered_feed() {
    let Some((state, _gate)) = with_fixture().await else {
        eprintln!("skipping: TEST_DATABASE_URL not set");
        return;
    };

    // Deb sees all seven fixture posts; the window skips rank 0 and takes
    // ranks 1 and 2 of the created-ascending order.
    let deb = login(&state, DEB).await;
    let pids = visible_pids(
        &state,
        Some(&deb),
        FeedOptions {
            limit: Some(2),
            offset: Some(1),
        },
    )
    .await;
    assert_eq!(pids, vec![2, 3]);
}

#[tokio::test]
async fn expired_sessions_resolve_like_brand_new_ones() {
    let Some((state, _gate)) = with_fixture().await else {
        eprintln!("skipping: TEST_DATABASE_URL not set");
        return;
    };

    let abe = login(&state, ABE).await;
    assert_eq!(abe.id, ABE);
    let nonce = format!("{:032x}", ABE as u128);

    // Age the session past the TTL behind the resolver's back.
    let client = state.db.get().await.unwrap();
    Sql::lit("UPDATE sessions SET created = NOW() - interval '2 hours' WHERE session_nonce = ")
        .bind(nonce.clone())
        .execute(&client)
        .await
        .unwrap();
    drop(client);

    // The old account association is gone, now and on every later resolve.
    assert!(session::resolve_session(&state, &nonce).await.unwrap().is_none());
    assert!(session::resolve_session(&state, &nonce).await.unwrap().is_none());

    let client = state.db.get().await.unwrap();
    let rows = Sql::lit("SELECT aid FROM sessions WHERE session_nonce = ")
        .bind(nonce)
        .query(&client)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get::<_, Option<i32>>("aid"), None);
}

#[tokio::test]
async fn null_authors_author_nothing() {
    let Some((state, _gate)) = with_fixture().await else {
        eprintln!("skipping: TEST_DATABASE_URL not set");
        return;
    };

    let client = state.db.get().await.unwrap();
    Sql::lit(
        "INSERT INTO posts (author, public, body_html, created) VALUES \
         (NULL, false, 'ghost', '2018-10-12 12:00:08+00'), \
         (NULL, true, 'ghost-pub', '2018-10-12 12:00:09+00')",
    )
    .execute(&client)
    .await
    .unwrap();
    drop(client);

    let deb = login(&state, DEB).await;
    let pids = visible_pids(&state, Some(&deb), FeedOptions::default()).await;
    assert!(pids.contains(&9));
    assert!(!pids.contains(&8));

    let pids = visible_pids(&state, None, FeedOptions::default()).await;
    assert!(pids.contains(&9));
    assert!(!pids.contains(&8));
}

#[tokio::test]
async fn hostile_bodies_are_sanitized_for_everyone() {
    let Some((state, _gate)) = with_fixture().await else {
        eprintln!("skipping: TEST_DATABASE_URL not set");
        return;
    };

    let entries = feed::get_visible_posts(&state, None, FeedOptions::default())
        .await
        .unwrap();
    assert!(!entries.is_empty());
    for entry in &entries {
        assert!(!entry.body.contains("<script"), "unsanitized body: {}", entry.body);
        if let Some(name) = &entry.author_name {
            assert!(!name.contains("<script"), "unsanitized name: {}", name);
        }
    }
}

#[tokio::test]
async fn friends_fetch_is_memoized_and_single_flight() {
    let Some((state, _gate)) = with_fixture().await else {
        eprintln!("skipping: TEST_DATABASE_URL not set");
        return;
    };

    let bef = login(&state, BEF).await;
    let (a, b) = tokio::join!(bef.friends(&state.db), bef.friends(&state.db));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a, b);

    let mut sorted = a.to_vec();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![ABE, DEB, FAE]);

    // A later read observes the same committed result.
    assert_eq!(bef.friends(&state.db).await.unwrap(), a);
}

#[tokio::test]
async fn submitted_posts_carry_their_images_in_order() {
    let Some((state, _gate)) = with_fixture().await else {
        eprintln!("skipping: TEST_DATABASE_URL not set");
        return;
    };

    let abe = login(&state, ABE).await;
    let pid = post_service::submit_post(
        &state,
        Some(&abe),
        true,
        "look at this",
        &[
            "/user-uploads/first.png".to_string(),
            "/user-uploads/../../../shadow.png".to_string(),
        ],
    )
    .await
    .unwrap();

    let entries = feed::get_visible_posts(
        &state,
        None,
        FeedOptions {
            limit: Some(20),
            offset: None,
        },
    )
    .await
    .unwrap();
    let entry = entries.iter().find(|e| e.pid == pid).expect("new post in feed");
    assert_eq!(entry.images, vec!["/user-uploads/first.png", "/shadow.png"]);
}

#[tokio::test]
async fn anonymous_private_posts_are_rejected() {
    let Some((state, _gate)) = with_fixture().await else {
        eprintln!("skipping: TEST_DATABASE_URL not set");
        return;
    };

    let err = post_service::submit_post(&state, None, false, "psst", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn schema_round_trip_lands_in_the_fixture_state() {
    let Some(state) = test_state() else {
        eprintln!("skipping: TEST_DATABASE_URL not set");
        return;
    };
    let _gate = DB_GATE.lock().await;

    schema::create_schema(&state.db).await.unwrap();
    // Idempotent over an existing schema.
    schema::create_schema(&state.db).await.unwrap();
    schema::reset_schema(&state.db).await.unwrap();
    assert_eq!(count(&state, "accounts").await, 0);

    schema::reset_schema_with_fixture_data(&state.db).await.unwrap();
    assert_eq!(count(&state, "accounts").await, 4);
    assert_eq!(count(&state, "personal_info").await, 4);
    assert_eq!(count(&state, "posts").await, 7);
    assert_eq!(count(&state, "friendships").await, 7);
    assert_eq!(count(&state, "sessions").await, 0);
    assert_eq!(count(&state, "post_resources").await, 0);
}
