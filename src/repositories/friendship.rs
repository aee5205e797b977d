use deadpool_postgres::Pool;

use crate::error::{AppError, Result};
use crate::models::account::AccountId;
use crate::sql::Sql;

/// The accounts `aid` unilaterally follows: edges where `left_aid = aid`.
///
/// No inverse lookup is exposed here. Mutual friendship, if a caller ever
/// needs it, is two unilateral queries; visibility never does.
pub async fn outgoing_friends(db: &Pool, aid: AccountId) -> Result<Vec<AccountId>> {
    let client = db.get().await?;
    let rows = Sql::lit("SELECT right_aid AS friend FROM friendships WHERE left_aid = ")
        .bind(aid)
        .query(&client)
        .await?;
    rows.iter()
        .map(|row| {
            row.try_get("friend")
                .map_err(|_| AppError::UnexpectedShape("friend".to_string()))
        })
        .collect()
}
