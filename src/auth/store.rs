//! Credential store capability and an in-memory implementation.

use anyhow::Result;
use async_trait::async_trait;

use crate::auth::context::User;

/// Read-only access to user records.
///
/// The gateway depends only on this trait, so the backing storage can be
/// swapped without touching the auth layer. Implementations must be safe to
/// call concurrently from any number of in-flight requests.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find the user owning `api_key`, active or not.
    async fn lookup_by_api_key(&self, api_key: &str) -> Result<Option<User>>;

    /// All users whose account is active.
    async fn get_all_active(&self) -> Result<Vec<User>>;
}

/// Credential store over a fixed snapshot of users.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    users: Vec<User>,
}

impl MemoryUserStore {
    pub fn new(users: Vec<User>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl CredentialStore for MemoryUserStore {
    async fn lookup_by_api_key(&self, api_key: &str) -> Result<Option<User>> {
        Ok(self.users.iter().find(|u| u.api_key == api_key).cloned())
    }

    async fn get_all_active(&self) -> Result<Vec<User>> {
        Ok(self.users.iter().filter(|u| u.is_active).cloned().collect())
    }
}
