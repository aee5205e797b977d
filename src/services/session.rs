use chrono::{DateTime, Utc};

use crate::capability::{Key, Sealed};
use crate::error::{AppError, Result};
use crate::handlers::account as account_page;
use crate::models::account::{Account, AccountId};
use crate::render;
use crate::repositories::session as session_repo;
use crate::state::AppState;

fn column<T>(row: &tokio_postgres::Row, name: &'static str) -> Result<T>
where
    T: for<'a> tokio_postgres::types::FromSql<'a>,
{
    row.try_get(name)
        .map_err(|_| AppError::UnexpectedShape(name.to_string()))
}

/// Resolves a session nonce to the account behind it, if any.
///
/// On one pooled connection: purge the row if it outlived the TTL, then
/// insert-or-refresh it, then read identity, display fields, and PII in one
/// join. A nonce nobody has logged in with (or whose session just expired)
/// resolves to `Ok(None)` — the anonymous viewer, never an error.
///
/// PII comes back sealed to the account page's capability; the friend list is
/// left unfetched until someone reads it.
pub async fn resolve_session(state: &AppState, nonce: &str) -> Result<Option<Account>> {
    let client = state.db.get().await?;

    session_repo::purge_if_stale(&client, nonce, state.config.session_ttl_secs).await?;
    session_repo::upsert(&client, nonce).await?;

    // The upsert guarantees the row exists; a missing row is a shape bug.
    let row = session_repo::lookup(&client, nonce)
        .await?
        .ok_or_else(|| AppError::UnexpectedShape("sessions.session_nonce".to_string()))?;

    let aid: Option<AccountId> = column(&row, "aid")?;
    let Some(aid) = aid else {
        return Ok(None);
    };

    let display_name: Option<String> = column(&row, "display_name")?;
    let display_name_html: Option<String> = column(&row, "display_name_html")?;
    let public_url: Option<String> = column(&row, "public_url")?;
    let created: Option<DateTime<Utc>> = column(&row, "account_created")?;
    let real_name: Option<String> = column(&row, "real_name")?;
    let email: Option<String> = column(&row, "email")?;

    let created = created.ok_or_else(|| AppError::UnexpectedShape("account_created".to_string()))?;

    let shown_name = render::display_name(
        state.markup.as_ref(),
        display_name.as_deref(),
        display_name_html.as_deref(),
    )
    .unwrap_or_else(|| "Anonymous".to_string());

    Ok(Some(Account::new(
        aid,
        shown_name,
        public_url,
        created,
        Sealed::seal(real_name, Key::only(account_page::render_key())),
        Sealed::seal(email, Key::only(account_page::render_key())),
    )))
}
