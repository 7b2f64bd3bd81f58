// HTTP surface of the gateway

use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    http::StatusCode,
    middleware::{self, Next},
    response::{Json, Response},
    routing::{get, post},
};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{ApiKeyValidator, AuthGate, CredentialStore, require_api_key};
use crate::config::GatewayConfig;
use crate::engine::ProtocolEngine;
use crate::session::{SessionRegistry, post_message, post_message_by_query, sse_handler};


/// State shared by the session endpoints.
pub struct GatewayState<E: ProtocolEngine> {
    pub validator: Arc<ApiKeyValidator>,
    pub engine: Arc<E>,
    pub sessions: Arc<SessionRegistry<E::Inbound>>,
}

impl<E: ProtocolEngine> Clone for GatewayState<E> {
    fn clone(&self) -> Self {
        Self {
            validator: Arc::clone(&self.validator),
            engine: Arc::clone(&self.engine),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

impl<E: ProtocolEngine> GatewayState<E> {
    pub fn new(config: &GatewayConfig, store: Arc<dyn CredentialStore>, engine: E) -> Self {
        Self {
            validator: Arc::new(ApiKeyValidator::new(config, store)),
            engine: Arc::new(engine),
            sessions: Arc::new(SessionRegistry::new()),
        }
    }
}

/// Build the full gateway router.
///
/// Every route sits behind the auth gate; the gate itself lets the public
/// prefixes through. The SSE and message endpoints share the validator the
/// gate uses, so both layers apply the same policy.
pub fn create_router<E: ProtocolEngine>(state: GatewayState<E>, static_dir: &Path) -> Router {
    let gate = Arc::new(AuthGate::new(Arc::clone(&state.validator)));

    let static_files = ServiceBuilder::new()
        .layer(middleware::from_fn(log_static_access))
        .service(ServeDir::new(static_dir));

    Router::new()
        .route("/sse", get(sse_handler::<E>))
        .route("/messages/", post(post_message_by_query::<E>))
        .route("/messages/{session_id}", post(post_message::<E>))
        .route("/health", get(health_check))
        .nest_service("/static", static_files)
        .with_state(state)
        .layer(middleware::from_fn_with_state(gate, require_api_key))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

async fn health_check() -> Json<Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Log every static asset served successfully, by its path under the static
/// directory.
async fn log_static_access(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    // Paths arrive with the `/static` prefix already stripped.
    let relative = path.trim_start_matches('/');
    if response.status() == StatusCode::OK && !relative.is_empty() {
        info!(file = %relative, "File accessed: {}", relative);
    }

    response
}
