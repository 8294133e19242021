use std::sync::Arc;

use anyhow::anyhow;
use uuid::Uuid;

use kudos_db::Database;
use kudos_db::models::UserRow;
use kudos_types::KudosError;
use kudos_types::models::User;

use crate::session::ChatSession;

/// Lookup-or-create resolution of platform handles. The store's unique
/// handle constraint is authoritative for concurrent first-sightings;
/// kudos-db resolves a losing insert by re-reading the winner's row.
pub struct UserDirectory {
    db: Arc<Database>,
    session: Arc<dyn ChatSession>,
}

impl UserDirectory {
    pub fn new(db: Arc<Database>, session: Arc<dyn ChatSession>) -> Self {
        Self { db, session }
    }

    pub async fn resolve(&self, handle: &str) -> Result<User, KudosError> {
        if let Some(row) = self
            .db
            .get_user_by_platform_id(handle)
            .map_err(KudosError::Storage)?
        {
            return row_to_user(row);
        }

        let profile = self
            .session
            .user_info(handle)
            .await
            .map_err(|_| KudosError::Lookup(handle.to_string()))?;

        let id = Uuid::new_v4();
        let row = self
            .db
            .insert_user(&id.to_string(), &profile.platform_id, &profile.username)
            .map_err(KudosError::Storage)?;

        row_to_user(row)
    }
}

fn row_to_user(row: UserRow) -> Result<User, KudosError> {
    let id = row
        .id
        .parse()
        .map_err(|e| KudosError::Storage(anyhow!("corrupt user id '{}': {}", row.id, e)))?;

    Ok(User {
        id,
        platform_id: row.platform_id,
        username: row.username,
    })
}
