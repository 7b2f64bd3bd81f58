//! MCP server implementation using rmcp, and the gateway entry point.
//!
//! Each SSE session gets its own [`SandboxServer`] bound to the session's
//! execution context. The gateway owns transport and identity; this handler
//! only reports which user the session runs as.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::handler::server::ServerHandler;
use rmcp::model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use tracing::info;

use crate::api::{GatewayState, create_router};
use crate::auth::CredentialStore;
use crate::config::GatewayConfig;
use crate::engine::{ExecutionContext, McpEngine};

/// MCP handler for one authenticated sandbox session.
#[derive(Debug, Clone)]
pub struct SandboxServer {
    context: ExecutionContext,
}

impl SandboxServer {
    pub fn new(context: ExecutionContext) -> Self {
        Self { context }
    }

    /// Identity every request on this session executes as.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }
}

impl ServerHandler for SandboxServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(format!(
                "Sandboxed execution session for user '{}' (id {}).",
                self.context.username(),
                self.context.user_id()
            )),
        }
    }
}

/// Engine serving every session with a fresh [`SandboxServer`].
pub fn sandbox_engine() -> McpEngine<impl Fn(&ExecutionContext) -> SandboxServer + Send + Sync + 'static>
{
    McpEngine::new(|context: &ExecutionContext| SandboxServer::new(context.clone()))
}

/// Start the gateway and serve until the listener fails.
///
/// Exposes `/sse`, `/messages/`, `/static/` and `/health` on `config.bind`.
/// The static directory is created if it does not exist yet.
pub async fn start_gateway(config: GatewayConfig, store: Arc<dyn CredentialStore>) -> Result<()> {
    tokio::fs::create_dir_all(&config.static_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create static directory {}",
                config.static_dir.display()
            )
        })?;

    let state = GatewayState::new(&config, store, sandbox_engine());
    let router = create_router(state, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;

    info!(
        "Sandbox gateway listening on http://{} (authentication {})",
        config.bind,
        config.auth_status()
    );

    axum::serve(listener, router).await?;

    Ok(())
}
