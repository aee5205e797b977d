use chrono::{Duration, Utc};
use deadpool_postgres::Client;
use tokio_postgres::Row;

use crate::error::Result;
use crate::sql::Sql;

/// Deletes the session row for `nonce` if it is older than the TTL.
///
/// Runs before the upsert so a stale session is purged rather than silently
/// extended.
pub async fn purge_if_stale(client: &Client, nonce: &str, ttl_secs: i64) -> Result<u64> {
    let cutoff = Utc::now() - Duration::seconds(ttl_secs);
    Sql::lit("DELETE FROM sessions WHERE session_nonce = ")
        .bind(nonce.to_string())
        .push(" AND created < ")
        .bind(cutoff)
        .execute(client)
        .await
}

/// Inserts a session row for `nonce` with no account, or refreshes the
/// timestamp of an existing one (sliding expiration). Atomic: two concurrent
/// first sightings of a nonce cannot both insert.
pub async fn upsert(client: &Client, nonce: &str) -> Result<()> {
    Sql::lit("INSERT INTO sessions (session_nonce, aid) VALUES (")
        .bind(nonce.to_string())
        .push(", NULL) ON CONFLICT (session_nonce) DO UPDATE SET created = NOW()")
        .execute(client)
        .await?;
    Ok(())
}

/// Fetches the session's account identity, display fields, and PII in one
/// read across sessions → accounts → personal_info.
pub async fn lookup(client: &Client, nonce: &str) -> Result<Option<Row>> {
    let rows = Sql::lit(
        "SELECT sessions.aid, accounts.display_name, accounts.display_name_html, \
         accounts.public_url, accounts.created AS account_created, \
         personal_info.real_name, personal_info.email \
         FROM sessions \
         LEFT JOIN accounts ON sessions.aid = accounts.aid \
         LEFT JOIN personal_info ON sessions.aid = personal_info.aid \
         WHERE sessions.session_nonce = ",
    )
    .bind(nonce.to_string())
    .query(client)
    .await?;
    Ok(rows.into_iter().next())
}
