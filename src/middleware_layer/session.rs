use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use rand::RngCore;
use std::sync::Arc;
use tower_cookies::{Cookie, Cookies};

use crate::models::account::Account;
use crate::services::session as session_service;
use crate::state::AppState;

/// The name of the session nonce cookie.
pub const SESSION_COOKIE: &str = "session_nonce";

/// The account resolved for the current request, if the session has one.
#[derive(Clone)]
pub struct CurrentAccount(pub Option<Arc<Account>>);

fn mint_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The cookie is client-controlled input; anything that is not 32 hex
/// characters is replaced rather than carried into the store.
fn valid_nonce(nonce: &str) -> bool {
    nonce.len() == 32 && nonce.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Resolves the session for every request and attaches it as an extension.
///
/// Mints a fresh nonce cookie when the request has none (or a malformed one).
/// An anonymous session is `CurrentAccount(None)`, never a rejection.
pub async fn attach_session(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let nonce = match cookies.get(SESSION_COOKIE) {
        Some(cookie) if valid_nonce(cookie.value()) => cookie.value().to_string(),
        _ => {
            let nonce = mint_nonce();
            cookies.add(Cookie::new(SESSION_COOKIE, nonce.clone()));
            nonce
        }
    };

    let account = session_service::resolve_session(&state, &nonce)
        .await
        .map_err(|e| {
            tracing::error!("Session resolution failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    request
        .extensions_mut()
        .insert(CurrentAccount(account.map(Arc::new)));

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_nonces_are_valid() {
        let nonce = mint_nonce();
        assert!(valid_nonce(&nonce));
        assert_ne!(nonce, mint_nonce());
    }

    #[test]
    fn malformed_cookie_values_are_rejected() {
        assert!(!valid_nonce(""));
        assert!(!valid_nonce("short"));
        assert!(!valid_nonce(&"x".repeat(32)));
        assert!(!valid_nonce(&"a".repeat(33)));
        assert!(valid_nonce(&"a".repeat(32)));
    }
}
