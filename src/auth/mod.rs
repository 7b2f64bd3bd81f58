//! API key authentication for the gateway.
//!
//! Two layers resolve a request's `?api_key=...` to a [`User`]:
//!
//! - **Auth gate**: axum middleware in front of every route. Public path
//!   prefixes (`/static/`, `/health`, `/messages/`) pass straight through;
//!   everything else is validated and annotated with [`AuthenticatedUser`]
//!   or answered with `401 {"detail": ...}`.
//! - **Session bridge**: the SSE endpoint validates the key a second time
//!   before opening a session, independent of the gate.
//!
//! Both go through the same [`ApiKeyValidator`], which reads users from an
//! injected [`CredentialStore`]. With authentication disabled the validator
//! always resolves to the synthetic root user.

mod context;
mod middleware;
mod store;
mod user_store;
mod validator;

pub use context::{AuthenticatedUser, DISABLED_AUTH_API_KEY, ROOT_USERNAME, User};
pub use middleware::{AuthDecision, AuthGate, PUBLIC_PATH_PREFIXES, require_api_key};
pub use store::{CredentialStore, MemoryUserStore};
pub use user_store::SurrealUserStore;
pub use validator::{API_KEY_PARAM, ApiKeyValidator, AuthError, extract_api_key, generate_api_key};
