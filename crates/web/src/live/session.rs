use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

use super::transport::{FrameSink, FrameSource, Transport, TransportError};

/// Upper bound on flushing a close frame to a peer that stopped reading.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Unique id of a viewer session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a session.
///
/// `Created -> Running -> Terminating -> Reclaimed`, never backwards. The
/// session publishes the first three through its [`SessionHandle`];
/// `Reclaimed` is reported by the registry once the entry is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, loops not started yet. Payloads are already queued.
    Created,
    /// Inbound and outbound loops are running.
    Running,
    /// A loop hit a terminal condition; the transport is being closed.
    Terminating,
    /// Removed from the registry.
    Reclaimed,
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The inbound loop saw the peer leave or a read error.
    PeerDisconnected,
    /// Writing a payload to the transport failed.
    WriteFailed,
    /// The outbound queue was closed.
    QueueClosed,
    /// The owner of the handle asked the session to stop, or dropped it.
    Shutdown,
}

/// Registry side of a session.
///
/// Dropping the handle has the same effect as [`SessionHandle::shutdown`].
pub struct SessionHandle {
    pub outbound: mpsc::Sender<Bytes>,
    pub shutdown: oneshot::Sender<()>,
    pub state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Stops the session even while it is blocked writing to its transport.
    pub fn shutdown(self) {
        let _ = self.shutdown.send(());
    }
}

/// One connected viewer: its transport and outbound queue.
pub struct Session {
    id: SessionId,
    state: watch::Sender<SessionState>,
    source: Box<dyn FrameSource>,
    sink: Box<dyn FrameSink>,
    outbound: mpsc::Receiver<Bytes>,
    shutdown: oneshot::Receiver<()>,
}

impl Session {
    /// Takes ownership of `transport`. Returns the session and the handle its
    /// owner uses to feed and stop it.
    pub fn new<T: Transport>(
        id: SessionId,
        transport: T,
        queue_capacity: usize,
    ) -> (Self, SessionHandle) {
        let (source, sink) = transport.split();
        let (outbound_tx, outbound_rx) = mpsc::channel(queue_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Created);

        let session = Self {
            id,
            state: state_tx,
            source: Box::new(source),
            sink: Box::new(sink),
            outbound: outbound_rx,
            shutdown: shutdown_rx,
        };
        let handle = SessionHandle {
            outbound: outbound_tx,
            shutdown: shutdown_tx,
            state: state_rx,
        };

        (session, handle)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Runs the inbound and outbound loops until either one stops or the
    /// session is shut down, then closes the transport. This is the only
    /// place the transport is closed.
    pub async fn run(self) -> Termination {
        let Session {
            id,
            state,
            source,
            mut sink,
            mut outbound,
            mut shutdown,
        } = self;
        transition(&id, &state, SessionState::Running);

        let mut inbound = tokio::spawn(drain_inbound(id.clone(), source));

        let termination = loop {
            tokio::select! {
                _ = &mut inbound => break Termination::PeerDisconnected,
                _ = &mut shutdown => break Termination::Shutdown,
                payload = outbound.recv() => {
                    let Some(payload) = payload else {
                        break Termination::QueueClosed;
                    };
                    // a peer that stopped reading blocks the write, so keep
                    // watching for disconnects and shutdown meanwhile
                    tokio::select! {
                        result = sink.write_frame(payload) => {
                            if let Err(e) = result {
                                tracing::warn!(session_id = %id, error = %e, "Failed to deliver message");
                                break Termination::WriteFailed;
                            }
                        }
                        _ = &mut inbound => break Termination::PeerDisconnected,
                        _ = &mut shutdown => break Termination::Shutdown,
                    }
                }
            }
        };

        transition(&id, &state, SessionState::Terminating);
        tracing::info!(session_id = %id, reason = ?termination, "Closing viewer connection");

        inbound.abort();
        match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(session_id = %id, error = %e, "Transport close failed");
            }
            Err(_) => {
                tracing::debug!(session_id = %id, "Transport close timed out, dropping it");
            }
        }

        termination
    }
}

fn transition(id: &SessionId, state: &watch::Sender<SessionState>, next: SessionState) {
    let previous = state.send_replace(next);
    tracing::debug!(session_id = %id, from = ?previous, to = ?next, "Session state change");
}

/// Reads and discards inbound frames until the peer goes away.
async fn drain_inbound(id: SessionId, mut source: Box<dyn FrameSource>) {
    loop {
        match source.read_frame().await {
            Ok(Some(frame)) => {
                tracing::trace!(session_id = %id, bytes = frame.len(), "Ignoring inbound frame");
            }
            Ok(None) | Err(TransportError::Closed) => {
                tracing::info!(session_id = %id, "Viewer disconnected");
                return;
            }
            Err(e) => {
                tracing::info!(session_id = %id, error = %e, "Viewer connection failed");
                return;
            }
        }
    }
}
