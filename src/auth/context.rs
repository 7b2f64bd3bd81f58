//! User identity as seen by the gateway.

use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// Username of the synthetic user returned when authentication is disabled.
pub const ROOT_USERNAME: &str = "root";

/// Placeholder key carried by the synthetic root user.
pub const DISABLED_AUTH_API_KEY: &str = "disabled-auth-mode";

/// A user record snapshot read from the credential store.
///
/// The gateway never mutates users; it only reads them to resolve an API key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Secret bearer key. Unique across users.
    pub api_key: String,
    pub is_active: bool,
}

impl User {
    pub fn new(
        id: impl Into<UserId>,
        username: impl Into<String>,
        api_key: impl Into<String>,
        is_active: bool,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            api_key: api_key.into(),
            is_active,
        }
    }

    /// The fixed identity every request resolves to when auth is disabled.
    pub fn root(default_user_id: impl Into<UserId>) -> Self {
        Self::new(default_user_id, ROOT_USERNAME, DISABLED_AUTH_API_KEY, true)
    }
}

// The key is redacted so a stray `{:?}` never leaks it into the logs.
impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .field("is_active", &self.is_active)
            .finish()
    }
}

/// Identity attached to a request by the auth gate.
///
/// Inserted into the request extensions so downstream handlers can read who
/// made the call. It is informational: the SSE endpoint re-validates the key
/// on its own rather than trusting this value.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl AuthenticatedUser {
    pub fn user(&self) -> &User {
        &self.0
    }
}
