//! SSE sessions bridging HTTP connections to a protocol engine.
//!
//! A session lives exactly as long as its SSE response stream:
//! `GET /sse` validates the caller, opens the session and spawns the engine
//! run; `POST /messages/{session_id}` feeds client messages into it. When the
//! stream ends or is dropped the [`SessionGuard`] tears everything down.

mod bridge;
mod messages;
mod registry;

use std::fmt;

pub use bridge::{session_events, sse_handler};
pub use messages::{MessageError, MessageQuery, post_message, post_message_by_query};
pub use registry::{OpenSession, SESSION_CHANNEL_CAPACITY, SessionGuard, SessionRegistry};

/// Failures that end a session's SSE stream abruptly.
#[derive(Debug, Clone)]
pub enum SessionError {
    /// The engine run returned an error or panicked
    Engine(String),
    /// An outbound frame could not be encoded as JSON
    Serialize(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Engine(msg) => write!(f, "Engine failure: {}", msg),
            Self::Serialize(msg) => write!(f, "Failed to encode frame: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}
