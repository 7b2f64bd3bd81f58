//! The protocol engine seam.
//!
//! The gateway owns connections and identity; what travels over a session is
//! the engine's business. An engine receives a [`SessionStreams`] pair for the
//! lifetime of one SSE connection and runs until it is done with it.

use std::future::Future;

use anyhow::{Result, anyhow};
use rmcp::handler::server::ServerHandler;
use rmcp::model::{ClientJsonRpcMessage, ServerJsonRpcMessage};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::PollSender;
use tracing::debug;

use crate::auth::User;
use crate::types::{SessionId, UserId};

/// Identity a session's execution requests run as.
///
/// Built from the user resolved at session open and handed to the engine
/// before any message is exchanged, so every request on the session acts as
/// that user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    user_id: UserId,
    username: String,
}

impl ExecutionContext {
    pub fn for_user(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            username: user.username.clone(),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Duplex channel pair scoped to one session.
///
/// `read` yields messages POSTed to the session's message endpoint in arrival
/// order; frames sent on `write` become SSE `message` events. Dropping `write`
/// ends the SSE stream.
pub struct SessionStreams<I, O> {
    pub session_id: SessionId,
    pub read: mpsc::Receiver<I>,
    pub write: mpsc::Sender<O>,
}

/// A remote-procedure engine that serves sessions.
pub trait ProtocolEngine: Send + Sync + 'static {
    /// Messages clients POST into a session.
    type Inbound: DeserializeOwned + Send + 'static;
    /// Frames the engine pushes to the client.
    type Outbound: Serialize + Send + 'static;
    /// Per-session initialization parameters. Opaque to the gateway.
    type Init: Send + 'static;

    /// Build the initialization parameters for a session bound to `context`.
    fn initialization_options(&self, context: &ExecutionContext) -> Self::Init;

    /// Serve one session until the engine is done with it.
    ///
    /// Errors are not retried; the gateway turns them into an abrupt close of
    /// the SSE connection.
    fn run(
        &self,
        streams: SessionStreams<Self::Inbound, Self::Outbound>,
        init: Self::Init,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Engine adapter running an rmcp [`ServerHandler`] over a session.
///
/// A fresh handler is built for every session from its execution context.
pub struct McpEngine<F> {
    factory: F,
}

impl<F> McpEngine<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

impl<F, H> ProtocolEngine for McpEngine<F>
where
    F: Fn(&ExecutionContext) -> H + Send + Sync + 'static,
    H: ServerHandler,
{
    type Inbound = ClientJsonRpcMessage;
    type Outbound = ServerJsonRpcMessage;
    type Init = H;

    fn initialization_options(&self, context: &ExecutionContext) -> H {
        (self.factory)(context)
    }

    async fn run(
        &self,
        streams: SessionStreams<ClientJsonRpcMessage, ServerJsonRpcMessage>,
        handler: H,
    ) -> Result<()> {
        let SessionStreams {
            session_id,
            read,
            write,
        } = streams;

        let transport = (PollSender::new(write), ReceiverStream::new(read));

        let service = rmcp::serve_server(handler, transport)
            .await
            .map_err(|e| anyhow!("MCP session {} failed to initialize: {}", session_id, e))?;

        let reason = service.waiting().await?;
        debug!(%session_id, ?reason, "MCP session finished");

        Ok(())
    }
}
