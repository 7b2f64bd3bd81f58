//! Open sessions, keyed by the token their message endpoint is addressed with.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::engine::SessionStreams;
use crate::types::SessionId;

/// Capacity of each session's inbound and outbound channels.
pub const SESSION_CHANNEL_CAPACITY: usize = 64;

/// Inbound senders of every open session.
///
/// The SSE task owning a session is the only writer of its entry; the message
/// endpoint only clones senders out. The lock is never held across an await.
pub struct SessionRegistry<I> {
    senders: RwLock<HashMap<SessionId, mpsc::Sender<I>>>,
}

impl<I> Default for SessionRegistry<I> {
    fn default() -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
        }
    }
}

/// Everything created when a session opens.
pub struct OpenSession<I, O> {
    /// Releases the session when dropped
    pub guard: SessionGuard<I>,
    /// Handed to the engine
    pub streams: SessionStreams<I, O>,
    /// Drained into the SSE response
    pub outbound: mpsc::Receiver<O>,
}

impl<I> SessionRegistry<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session and create its channel pair.
    pub fn open<O>(self: &Arc<Self>) -> OpenSession<I, O> {
        let session_id = SessionId::generate();
        let (inbound_tx, inbound_rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);

        self.write().insert(session_id, inbound_tx);
        debug!(%session_id, "Session registered");

        OpenSession {
            guard: SessionGuard {
                session_id,
                registry: Arc::clone(self),
                engine: None,
            },
            streams: SessionStreams {
                session_id,
                read: inbound_rx,
                write: outbound_tx,
            },
            outbound: outbound_rx,
        }
    }

    /// Inbound sender of an open session.
    pub fn sender(&self, session_id: &SessionId) -> Option<mpsc::Sender<I>> {
        self.read().get(session_id).cloned()
    }

    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.read().contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, session_id: &SessionId) {
        self.write().remove(session_id);
    }

    // A panic while holding the lock leaves the map itself consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionId, mpsc::Sender<I>>> {
        self.senders.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, mpsc::Sender<I>>> {
        self.senders.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Scoped ownership of one open session.
///
/// Dropping the guard unregisters the session, which closes its inbound
/// channel, and aborts the engine task if one is attached. This happens the
/// same way whether the engine finished, the client went away or the stream
/// failed.
pub struct SessionGuard<I> {
    session_id: SessionId,
    registry: Arc<SessionRegistry<I>>,
    engine: Option<AbortHandle>,
}

impl<I> SessionGuard<I> {
    pub fn id(&self) -> SessionId {
        self.session_id
    }

    /// Path clients POST session messages to.
    pub fn endpoint(&self) -> String {
        format!("/messages/{}", self.session_id)
    }

    /// Tie the engine task's lifetime to this session.
    pub fn attach_engine(&mut self, handle: AbortHandle) {
        self.engine = Some(handle);
    }
}

impl<I> Drop for SessionGuard<I> {
    fn drop(&mut self) {
        self.registry.remove(&self.session_id);
        if let Some(engine) = self.engine.take() {
            engine.abort();
        }
        debug!(session_id = %self.session_id, "Session closed");
    }
}
