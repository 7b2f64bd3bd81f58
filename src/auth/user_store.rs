//! User storage and management backed by SurrealDB.

use anyhow::{Result, bail};
use async_trait::async_trait;

use crate::auth::context::User;
use crate::auth::store::CredentialStore;
use crate::db::Db;
use crate::db::schema::{UserCreate, UserRecord};

const USER_FIELDS: &str = "user_id, username, api_key, is_active, created_at";

/// User store for database operations.
pub struct SurrealUserStore {
    db: Db,
}

impl SurrealUserStore {
    /// Create a new user store.
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Create a new active user.
    ///
    /// Usernames are unique ignoring case; API keys are unique.
    pub async fn create_user(&self, create: &UserCreate) -> Result<UserRecord> {
        if self.get_user_by_username(&create.username).await?.is_some() {
            bail!("User '{}' already exists", create.username);
        }

        let user_id = uuid::Uuid::new_v4().to_string();

        let query = r#"
            CREATE type::thing('user', $user_id) CONTENT {
                user_id: $user_id,
                username: $username,
                username_lower: string::lowercase($username),
                api_key: $api_key,
                is_active: true
            } RETURN NONE
        "#;

        self.db
            .query(query)
            .bind(("user_id", user_id.clone()))
            .bind(("username", create.username.clone()))
            .bind(("api_key", create.api_key.clone()))
            .await?
            .check()?;

        self.get_user_by_id(&user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to create user"))
    }

    /// Get a user by its opaque id.
    pub async fn get_user_by_id(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let query = format!("SELECT {} FROM user WHERE user_id = $user_id LIMIT 1", USER_FIELDS);

        let mut res = self
            .db
            .query(query)
            .bind(("user_id", user_id.to_string()))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next())
    }

    /// Get a user by username, ignoring case.
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let query = format!(
            "SELECT {} FROM user WHERE username_lower = $username LIMIT 1",
            USER_FIELDS
        );

        let mut res = self
            .db
            .query(query)
            .bind(("username", username.to_lowercase()))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next())
    }

    /// List users ordered by creation time.
    pub async fn list_users(&self, active_only: bool) -> Result<Vec<UserRecord>> {
        let filter = if active_only { "WHERE is_active = true " } else { "" };
        let query = format!(
            "SELECT {} FROM user {}ORDER BY created_at ASC",
            USER_FIELDS, filter
        );

        let mut res = self.db.query(query).await?;
        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users)
    }

    /// Deactivate a user account. Returns false if no such user exists.
    pub async fn deactivate_user(&self, username: &str) -> Result<bool> {
        let query = format!(
            "UPDATE user SET is_active = false WHERE username_lower = $username RETURN {}",
            USER_FIELDS
        );

        let mut res = self
            .db
            .query(query)
            .bind(("username", username.to_lowercase()))
            .await?;

        let updated: Vec<UserRecord> = res.take(0)?;
        Ok(!updated.is_empty())
    }
}

#[async_trait]
impl CredentialStore for SurrealUserStore {
    async fn lookup_by_api_key(&self, api_key: &str) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM user WHERE api_key = $api_key LIMIT 1", USER_FIELDS);

        let mut res = self
            .db
            .query(query)
            .bind(("api_key", api_key.to_string()))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next().map(User::from))
    }

    async fn get_all_active(&self) -> Result<Vec<User>> {
        Ok(self
            .list_users(true)
            .await?
            .into_iter()
            .map(User::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DatabaseConfig, create_connection, ensure_schema};

    async fn setup_store() -> SurrealUserStore {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();
        SurrealUserStore::new(db)
    }

    fn create(username: &str, api_key: &str) -> UserCreate {
        UserCreate {
            username: username.to_string(),
            api_key: api_key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup_user() {
        let store = setup_store().await;
        let record = store.create_user(&create("alice", "abc123")).await.unwrap();
        assert_eq!(record.username, "alice");
        assert!(record.is_active);
        assert!(record.created_at.is_some());

        let user = store.lookup_by_api_key("abc123").await.unwrap().unwrap();
        assert_eq!(user.id.as_str(), record.user_id);
        assert_eq!(user.username, "alice");

        assert!(store.lookup_by_api_key("wrong").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_rejected() {
        let store = setup_store().await;
        store.create_user(&create("alice", "abc123")).await.unwrap();
        let result = store.create_user(&create("ALICE", "other")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_get_user_by_username_ignores_case() {
        let store = setup_store().await;
        store.create_user(&create("Alice", "abc123")).await.unwrap();
        let found = store.get_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.username, "Alice");
    }

    #[tokio::test]
    async fn test_deactivated_user_leaves_active_set() {
        let store = setup_store().await;
        store.create_user(&create("alice", "abc123")).await.unwrap();
        store.create_user(&create("bob", "def456")).await.unwrap();

        assert!(store.deactivate_user("bob").await.unwrap());
        assert!(!store.deactivate_user("nobody").await.unwrap());

        let active = store.get_all_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].username, "alice");

        // Lookup still finds the record; the validator rejects it.
        let bob = store.lookup_by_api_key("def456").await.unwrap().unwrap();
        assert!(!bob.is_active);

        assert_eq!(store.list_users(false).await.unwrap().len(), 2);
    }
}
