//! API key validation for HTTP requests.

use std::fmt;
use std::sync::Arc;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, error};

use crate::auth::context::User;
use crate::auth::store::CredentialStore;
use crate::config::GatewayConfig;
use crate::types::UserId;

/// Query parameter carrying the API key.
pub const API_KEY_PARAM: &str = "api_key";

/// Prefix of generated API keys.
pub const API_KEY_PREFIX: &str = "sk-";

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `api_key` on a request that needs one
    MissingKey,
    /// Key present but no active user owns it
    InvalidKey,
    /// The credential store could not be read
    Store(String),
}

impl AuthError {
    /// Reason string returned in the `detail` field of the response body.
    pub fn detail(&self) -> &'static str {
        match self {
            Self::MissingKey => "API Key is required",
            Self::InvalidKey => "Invalid API Key",
            Self::Store(_) => "Credential store unavailable",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingKey | Self::InvalidKey => StatusCode::UNAUTHORIZED,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(msg) => write!(f, "Credential store error: {}", msg),
            other => write!(f, "{}", other.detail()),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "detail": self.detail() }))).into_response()
    }
}

/// Resolves the `api_key` query parameter of a request to a user.
pub struct ApiKeyValidator {
    require_auth: bool,
    default_user_id: UserId,
    store: Arc<dyn CredentialStore>,
}

impl ApiKeyValidator {
    /// Create a new validator.
    pub fn new(config: &GatewayConfig, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            require_auth: config.require_auth,
            default_user_id: UserId::new(config.default_user_id.clone()),
            store,
        }
    }

    /// Whether requests must present a key at all.
    pub fn requires_auth(&self) -> bool {
        self.require_auth
    }

    /// Validate the raw query string of a request.
    ///
    /// With authentication disabled this always returns the synthetic root
    /// user and never touches the store.
    pub async fn validate(&self, raw_query: Option<&str>) -> Result<User, AuthError> {
        if !self.require_auth {
            return Ok(User::root(self.default_user_id.clone()));
        }

        let api_key = extract_api_key(raw_query).ok_or(AuthError::MissingKey)?;

        let user = self
            .store
            .lookup_by_api_key(&api_key)
            .await
            .map_err(|e| {
                error!("Credential store lookup failed: {:#}", e);
                AuthError::Store(e.to_string())
            })?
            .ok_or(AuthError::InvalidKey)?;

        if !user.is_active {
            debug!(username = %user.username, "Rejected API key of inactive user");
            return Err(AuthError::InvalidKey);
        }

        Ok(user)
    }
}

/// Pull the first non-empty `api_key` value out of a URL-encoded query string.
pub fn extract_api_key(raw_query: Option<&str>) -> Option<String> {
    let query = raw_query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == API_KEY_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Generate a new API key of the form `sk-<32 hex digits>`.
pub fn generate_api_key() -> String {
    format!("{}{}", API_KEY_PREFIX, uuid::Uuid::new_v4().simple())
}
