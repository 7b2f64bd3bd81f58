// Core modules
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod engine;
pub mod server;
pub mod session;
pub mod types;

// Re-export key types and functions
pub use api::{GatewayState, create_router};
pub use auth::{
    ApiKeyValidator, AuthError, AuthGate, CredentialStore, MemoryUserStore, SurrealUserStore, User,
    generate_api_key,
};
pub use config::GatewayConfig;
pub use db::{DatabaseConfig, create_connection, ensure_schema};
pub use engine::{ExecutionContext, McpEngine, ProtocolEngine, SessionStreams};
pub use server::{SandboxServer, sandbox_engine, start_gateway};
pub use session::{SessionError, SessionRegistry};
pub use types::{SessionId, UserId};
