//! The message endpoint feeding client messages into open sessions.

use std::fmt;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::api::GatewayState;
use crate::engine::ProtocolEngine;
use crate::types::SessionId;

/// Errors answering a message POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// Neither a path segment nor a `session_id` parameter was given
    MissingSessionId,
    /// The session id is not a valid token
    InvalidSessionId,
    /// No open session has this id
    SessionNotFound,
    /// The body is not a valid message for the engine
    InvalidMessage(String),
}

impl MessageError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::SessionNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn detail(&self) -> &'static str {
        match self {
            Self::MissingSessionId => "session_id is required",
            Self::InvalidSessionId => "Invalid session ID",
            Self::SessionNotFound => "Could not find session",
            Self::InvalidMessage(_) => "Could not parse message",
        }
    }
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMessage(msg) => write!(f, "Could not parse message: {}", msg),
            other => write!(f, "{}", other.detail()),
        }
    }
}

impl std::error::Error for MessageError {}

impl IntoResponse for MessageError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "detail": self.detail() }))).into_response()
    }
}

/// Query form of the message endpoint, `POST /messages/?session_id=...`.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub session_id: Option<String>,
}

/// `POST /messages/{session_id}`
pub async fn post_message<E: ProtocolEngine>(
    State(state): State<GatewayState<E>>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, MessageError> {
    deliver(&state, Some(&session_id), &body).await
}

/// `POST /messages/?session_id=...`
pub async fn post_message_by_query<E: ProtocolEngine>(
    State(state): State<GatewayState<E>>,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, MessageError> {
    deliver(&state, query.session_id.as_deref(), &body).await
}

async fn deliver<E: ProtocolEngine>(
    state: &GatewayState<E>,
    raw_session_id: Option<&str>,
    body: &[u8],
) -> Result<(StatusCode, &'static str), MessageError> {
    let raw_session_id = raw_session_id
        .filter(|id| !id.is_empty())
        .ok_or(MessageError::MissingSessionId)?;
    let session_id = SessionId::parse(raw_session_id).ok_or(MessageError::InvalidSessionId)?;

    let sender = state
        .sessions
        .sender(&session_id)
        .ok_or(MessageError::SessionNotFound)?;

    let message: E::Inbound = serde_json::from_slice(body).map_err(|e| {
        warn!(%session_id, "Rejected unparseable session message: {}", e);
        MessageError::InvalidMessage(e.to_string())
    })?;

    // Awaiting the send keeps messages in arrival order within a session.
    sender
        .send(message)
        .await
        .map_err(|_| MessageError::SessionNotFound)?;

    debug!(%session_id, bytes = body.len(), "Delivered session message");
    Ok((StatusCode::ACCEPTED, "Accepted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_error_status_codes() {
        assert_eq!(MessageError::SessionNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(MessageError::MissingSessionId.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(MessageError::InvalidSessionId.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            MessageError::InvalidMessage("eof".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_message_error_body() {
        let response = MessageError::SessionNotFound.into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({"detail": "Could not find session"}));
    }
}
