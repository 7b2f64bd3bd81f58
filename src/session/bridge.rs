//! The SSE endpoint opening sessions.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{RawQuery, State},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::GatewayState;
use crate::engine::{ExecutionContext, ProtocolEngine};
use crate::session::{OpenSession, SessionError, SessionGuard};

/// `GET /sse`: open a session for the caller and stream its output.
///
/// The API key is validated here again, independently of the auth gate, so
/// a session is never opened on the strength of a request annotation alone.
pub async fn sse_handler<E: ProtocolEngine>(
    State(state): State<GatewayState<E>>,
    RawQuery(query): RawQuery,
) -> Response {
    let user = match state.validator.validate(query.as_deref()).await {
        Ok(user) => user,
        Err(err) => {
            warn!("SSE session rejected: {}", err);
            return err.into_response();
        }
    };

    let context = ExecutionContext::for_user(&user);
    let init = state.engine.initialization_options(&context);

    let OpenSession {
        mut guard,
        streams,
        outbound,
    } = state.sessions.open::<E::Outbound>();

    info!(
        session_id = %guard.id(),
        user_id = %context.user_id(),
        username = %context.username(),
        "SSE session opened"
    );

    let engine = Arc::clone(&state.engine);
    let run = tokio::spawn(async move { engine.run(streams, init).await });
    guard.attach_engine(run.abort_handle());

    Sse::new(session_events(guard, outbound, run))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// SSE events of one session.
///
/// Emits the `endpoint` event first, then one `message` event per outbound
/// frame. The stream owns the session guard, so the session is released when
/// the stream completes or the client disconnects and the body is dropped.
/// An engine failure is yielded as an error, which aborts the connection.
pub fn session_events<I, O>(
    guard: SessionGuard<I>,
    mut outbound: mpsc::Receiver<O>,
    run: JoinHandle<Result<()>>,
) -> impl Stream<Item = Result<Event, SessionError>> + Send + 'static
where
    I: Send + 'static,
    O: Serialize + Send + 'static,
{
    async_stream::stream! {
        let guard = guard;
        let session_id = guard.id();

        yield Ok(Event::default().event("endpoint").data(guard.endpoint()));

        while let Some(frame) = outbound.recv().await {
            match Event::default().event("message").json_data(&frame) {
                Ok(event) => yield Ok(event),
                Err(e) => {
                    error!(%session_id, "Dropping session, frame not serializable: {}", e);
                    yield Err(SessionError::Serialize(e.to_string()));
                    return;
                }
            }
        }

        // The engine dropped its writer; collect how the run ended.
        match run.await {
            Ok(Ok(())) => info!(%session_id, "SSE session completed"),
            Ok(Err(e)) => {
                error!(%session_id, "Engine run failed: {:#}", e);
                yield Err(SessionError::Engine(format!("{:#}", e)));
            }
            Err(e) if e.is_cancelled() => debug!(%session_id, "Engine run cancelled"),
            Err(e) => {
                error!(%session_id, "Engine run panicked: {}", e);
                yield Err(SessionError::Engine(e.to_string()));
            }
        }
    }
}
