//! Auth gate applied to every inbound request.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::auth::context::{AuthenticatedUser, User};
use crate::auth::validator::{ApiKeyValidator, AuthError};

/// Path prefixes that never require an API key.
///
/// `/messages/` is keyed by the session token handed out when the SSE
/// session was opened, and that handshake was already authenticated.
pub const PUBLIC_PATH_PREFIXES: [&str; 3] = ["/static/", "/health", "/messages/"];

/// Outcome of gating one request.
#[derive(Debug)]
pub enum AuthDecision {
    /// Auth disabled or a public path: forward untouched
    Bypass,
    /// Key resolved to an active user
    Authorized(User),
    /// Reject with the given error
    Unauthorized(AuthError),
}

/// Decides, per request path, whether to validate and with which validator.
pub struct AuthGate {
    validator: Arc<ApiKeyValidator>,
}

impl AuthGate {
    pub fn new(validator: Arc<ApiKeyValidator>) -> Self {
        Self { validator }
    }

    pub fn is_public_path(path: &str) -> bool {
        PUBLIC_PATH_PREFIXES
            .iter()
            .any(|prefix| path.starts_with(prefix))
    }

    /// Decide what to do with a request for `path` carrying `raw_query`.
    pub async fn decide(&self, path: &str, raw_query: Option<&str>) -> AuthDecision {
        if !self.validator.requires_auth() || Self::is_public_path(path) {
            return AuthDecision::Bypass;
        }

        match self.validator.validate(raw_query).await {
            Ok(user) => AuthDecision::Authorized(user),
            Err(err) => AuthDecision::Unauthorized(err),
        }
    }
}

/// Axum middleware enforcing `?api_key=...` on non-public paths.
pub async fn require_api_key(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    let decision = gate
        .decide(request.uri().path(), request.uri().query())
        .await;

    match decision {
        AuthDecision::Bypass => next.run(request).await,
        AuthDecision::Authorized(user) => {
            debug!(username = %user.username, "Authenticated user");
            request.extensions_mut().insert(AuthenticatedUser(user));
            next.run(request).await
        }
        AuthDecision::Unauthorized(err) => {
            debug!(path = %request.uri().path(), "Request rejected: {}", err);
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::{CredentialStore, MemoryUserStore};
    use crate::config::GatewayConfig;
    use async_trait::async_trait;
    use axum::{Router, body::Body, http::StatusCode, routing::get};
    use http::Request as HttpRequest;
    use serde_json::json;
    use std::io::Write;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Store that counts every read and knows only alice.
    #[derive(Default)]
    struct CountingStore {
        reads: AtomicUsize,
    }

    #[async_trait]
    impl CredentialStore for CountingStore {
        async fn lookup_by_api_key(&self, api_key: &str) -> anyhow::Result<Option<User>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok((api_key == "abc123").then(|| User::new("1", "alice", "abc123", true)))
        }

        async fn get_all_active(&self) -> anyhow::Result<Vec<User>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(vec![User::new("1", "alice", "abc123", true)])
        }
    }

    /// Formatted log output shared with the test body.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    async fn whoami(request: Request) -> String {
        request
            .extensions()
            .get::<AuthenticatedUser>()
            .map(|u| u.user().username.clone())
            .unwrap_or_else(|| "nobody".to_string())
    }

    fn app(require_auth: bool, store: Arc<dyn CredentialStore>) -> Router {
        let config = GatewayConfig {
            require_auth,
            ..Default::default()
        };
        let gate = Arc::new(AuthGate::new(Arc::new(ApiKeyValidator::new(&config, store))));
        Router::new()
            .route("/private", get(whoami))
            .route("/health", get(whoami))
            .route("/static/{*path}", get(whoami))
            .route("/messages/{id}", get(whoami))
            .layer(axum::middleware::from_fn_with_state(gate, require_api_key))
    }

    async fn call(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(HttpRequest::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn test_public_paths() {
        assert!(AuthGate::is_public_path("/static/logo.png"));
        assert!(AuthGate::is_public_path("/health"));
        assert!(AuthGate::is_public_path("/messages/abc"));
        assert!(!AuthGate::is_public_path("/sse"));
        assert!(!AuthGate::is_public_path("/static"));
        assert!(!AuthGate::is_public_path("/"));
    }

    #[tokio::test]
    async fn test_public_paths_never_read_store() {
        let store = Arc::new(CountingStore::default());
        for uri in ["/health", "/static/logo.png", "/messages/abc"] {
            let (status, body) = call(app(true, store.clone()), uri).await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
            assert_eq!(body, "nobody");
        }
        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_key_is_rejected() {
        let (status, body) = call(app(true, Arc::new(CountingStore::default())), "/private").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body, json!({"detail": "API Key is required"}));
    }

    #[tokio::test]
    async fn test_invalid_key_is_rejected() {
        let (status, body) = call(
            app(true, Arc::new(CountingStore::default())),
            "/private?api_key=wrong",
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body, json!({"detail": "Invalid API Key"}));
    }

    #[tokio::test]
    async fn test_valid_key_annotates_request() {
        let (status, body) = call(
            app(true, Arc::new(CountingStore::default())),
            "/private?api_key=abc123",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "alice");
    }

    #[tokio::test]
    async fn test_authenticated_user_logged_without_key() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (status, _) = call(
            app(true, Arc::new(CountingStore::default())),
            "/private?api_key=abc123",
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Authenticated user"), "{}", output);
        assert!(output.contains("alice"), "{}", output);
        assert!(!output.contains("abc123"), "{}", output);
    }

    #[tokio::test]
    async fn test_disabled_auth_forwards_everything() {
        let store = Arc::new(CountingStore::default());
        for uri in ["/private", "/private?api_key=wrong", "/health"] {
            let (status, body) = call(app(false, store.clone()), uri).await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
            assert_eq!(body, "nobody");
        }
        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_decide() {
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryUserStore::new(vec![User::new(
            "1", "alice", "abc123", true,
        )]));
        let config = GatewayConfig::default();
        let gate = AuthGate::new(Arc::new(ApiKeyValidator::new(&config, store)));

        assert!(matches!(
            gate.decide("/health", None).await,
            AuthDecision::Bypass
        ));
        assert!(matches!(
            gate.decide("/sse", Some("api_key=abc123")).await,
            AuthDecision::Authorized(u) if u.username == "alice"
        ));
        assert!(matches!(
            gate.decide("/sse", None).await,
            AuthDecision::Unauthorized(AuthError::MissingKey)
        ));
    }
}
