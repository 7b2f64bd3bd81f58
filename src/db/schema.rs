use serde::{Deserialize, Serialize};
use surrealdb::sql::Datetime;

use crate::auth::User;
use crate::types::UserId;

/// Persisted user record, as projected by the user store queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Opaque user identifier handed to the sandbox context
    pub user_id: String,
    pub username: String,
    pub api_key: String,
    /// Whether the user may authenticate
    pub is_active: bool,
    pub created_at: Option<Datetime>,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User {
            id: UserId::new(record.user_id),
            username: record.username,
            api_key: record.api_key,
            is_active: record.is_active,
        }
    }
}

/// Payload for creating a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreate {
    pub username: String,
    pub api_key: String,
}
