use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio::sync::OnceCell;

use crate::capability::Sealed;
use crate::error::Result;
use crate::repositories::friendship;

/// A durable account identity, distinct from any login session.
pub type AccountId = i32;

/// The identity resolved for a request's session.
///
/// Display fields are plain data. `real_name` and `email` are sealed at
/// construction time and can only be read by the one code path holding the
/// account page's capability. The friend list is not part of the row this was
/// built from; it is fetched lazily, at most once, when something actually
/// asks for it.
#[derive(Debug)]
pub struct Account {
    /// The unique identifier for the account.
    pub id: AccountId,
    /// The resolved display name (HTML name sanitized, else plain, else a default).
    pub display_name: String,
    /// The account's public profile URL, if one is set.
    pub public_url: Option<String>,
    /// The timestamp when the account was created.
    pub created: DateTime<Utc>,
    /// The account holder's real name. Sealed; opens only for the account page.
    pub real_name: Sealed<Option<String>>,
    /// The account holder's email address. Sealed; opens only for the account page.
    pub email: Sealed<Option<String>>,
    friends: OnceCell<Vec<AccountId>>,
}

impl Account {
    /// Only the session resolver builds accounts; the friend list therefore
    /// can never be injected from outside.
    pub(crate) fn new(
        id: AccountId,
        display_name: String,
        public_url: Option<String>,
        created: DateTime<Utc>,
        real_name: Sealed<Option<String>>,
        email: Sealed<Option<String>>,
    ) -> Self {
        Self {
            id,
            display_name,
            public_url,
            created,
            real_name,
            email,
            friends: OnceCell::new(),
        }
    }

    /// The accounts this one unilaterally follows.
    ///
    /// Lazily fetched and memoized: the first access commits to one in-flight
    /// query and every concurrent reader observes that same result; later
    /// accesses never hit the database again.
    pub async fn friends(&self, db: &Pool) -> Result<&[AccountId]> {
        let list = self
            .friends
            .get_or_try_init(|| friendship::outgoing_friends(db, self.id))
            .await?;
        Ok(list.as_slice())
    }
}
