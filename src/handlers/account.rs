use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension,
};
use std::sync::LazyLock;

use crate::capability::Key;
use crate::error::Result;
use crate::middleware_layer::session::CurrentAccount;
use crate::state::AppState;

// SENSITIVE - the only capability that opens sealed PII. It lives here, in
// the one code path allowed to render it, and is never exported.
static RENDER_KEY: LazyLock<Key> = LazyLock::new(Key::mint);

/// The distinguished capability presented by the account page when it
/// renders PII. The session resolver seals `real_name`/`email` to exactly
/// this key.
pub(crate) fn render_key() -> &'static Key {
    &RENDER_KEY
}

/// Renders the viewer's own account, including their PII.
#[axum::debug_handler]
pub async fn account_page(
    State(_state): State<AppState>,
    Extension(current): Extension<CurrentAccount>,
) -> Result<Response> {
    let Some(account) = current.0 else {
        return Ok((StatusCode::OK, r#"{"account":null}"#).into_response());
    };

    let none = None;
    let real_name = account.real_name.open_or(render_key(), &none);
    let email = account.email.open_or(render_key(), &none);

    let response = sonic_rs::to_string(&sonic_rs::json!({
        "account": {
            "aid": account.id,
            "display_name": account.display_name,
            "public_url": account.public_url,
            "created": account.created.to_rfc3339(),
            "real_name": real_name,
            "email": email,
        }
    }))
    .unwrap_or_else(|_| r#"{"account":null}"#.to_string());

    Ok((StatusCode::OK, response).into_response())
}
