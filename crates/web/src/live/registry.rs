use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use super::session::{Session, SessionHandle, SessionId, SessionState};
use super::transport::Transport;

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct RegistryConfig {
    /// Payloads a session may have waiting before it is evicted.
    pub queue_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

enum Command {
    Add {
        session: Session,
        handle: SessionHandle,
    },
    Start {
        id: SessionId,
        reply: oneshot::Sender<Option<Session>>,
    },
    SendAll(Bytes),
    SendOne {
        id: SessionId,
        payload: Bytes,
    },
    Reclaim(SessionId),
    Count(oneshot::Sender<usize>),
    State {
        id: SessionId,
        reply: oneshot::Sender<SessionState>,
    },
}

struct Entry {
    handle: SessionHandle,
    /// Held until the session is started.
    pending: Option<Session>,
}

/// Registry of connected viewers and broadcaster of leaderboard updates.
///
/// The membership map is owned by a single actor task. This handle only
/// sends it commands over an unbounded channel, so every method that
/// enqueues is non-blocking and commands are applied in the order they were
/// issued. Cloning the handle is cheap.
///
/// Each session has a bounded outbound queue. A session whose queue is full
/// when a payload arrives is evicted: it is removed from the map and shut
/// down, which interrupts a write blocked on a peer that stopped reading and
/// closes the transport. Payloads still queued for it are discarded.
#[derive(Clone)]
pub struct ConnectionRegistry {
    commands: mpsc::UnboundedSender<Command>,
    config: RegistryConfig,
}

impl ConnectionRegistry {
    /// Spawns the owning actor. Must be called inside a tokio runtime.
    pub fn new(config: RegistryConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_registry(rx));

        Self {
            commands: tx,
            config,
        }
    }

    /// Registers a new session around `transport` and returns its id.
    ///
    /// Payloads sent to the session are queued until [`Self::start_client`]
    /// runs it.
    pub fn add_client<T: Transport>(&self, transport: T) -> SessionId {
        let id = SessionId::generate();
        let (session, handle) = Session::new(id.clone(), transport, self.config.queue_capacity);

        self.send(Command::Add { session, handle });
        id
    }

    /// Runs the session until it terminates, then reclaims it.
    ///
    /// Blocks the calling task for the whole lifetime of the connection.
    pub async fn start_client(&self, id: &SessionId) {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start {
            id: id.clone(),
            reply,
        });

        let Ok(Some(session)) = rx.await else {
            tracing::debug!(session_id = %id, "Session is not registered, nothing to start");
            return;
        };

        session.run().await;
        self.send(Command::Reclaim(id.clone()));
    }

    /// Queues `payload` for every registered session.
    pub fn send_message_to_all(&self, payload: Bytes) {
        self.send(Command::SendAll(payload));
    }

    /// Queues `payload` for one session. Unknown ids are ignored.
    pub fn send_message_to_one(&self, payload: Bytes, id: &SessionId) {
        self.send(Command::SendOne {
            id: id.clone(),
            payload,
        });
    }

    pub async fn session_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Count(reply));
        rx.await.unwrap_or(0)
    }

    pub async fn session_state(&self, id: &SessionId) -> SessionState {
        let (reply, rx) = oneshot::channel();
        self.send(Command::State {
            id: id.clone(),
            reply,
        });
        rx.await.unwrap_or(SessionState::Reclaimed)
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::error!("Connection registry is no longer running");
        }
    }
}

async fn run_registry(mut commands: mpsc::UnboundedReceiver<Command>) {
    let mut sessions: HashMap<SessionId, Entry> = HashMap::new();

    while let Some(command) = commands.recv().await {
        match command {
            Command::Add { session, handle } => {
                let id = session.id().clone();
                sessions.insert(
                    id.clone(),
                    Entry {
                        handle,
                        pending: Some(session),
                    },
                );
                tracing::info!(session_id = %id, sessions = sessions.len(), "Viewer connected");
            }
            Command::Start { id, reply } => {
                let session = sessions.get_mut(&id).and_then(|entry| entry.pending.take());
                let _ = reply.send(session);
            }
            Command::SendAll(payload) => {
                let overflowed: Vec<SessionId> = sessions
                    .iter()
                    .filter(|(_, entry)| !enqueue(&entry.handle.outbound, payload.clone()))
                    .map(|(id, _)| id.clone())
                    .collect();

                for id in overflowed {
                    evict(&mut sessions, &id);
                }
                tracing::debug!(sessions = sessions.len(), bytes = payload.len(), "Broadcast queued");
            }
            Command::SendOne { id, payload } => match sessions.get(&id) {
                Some(entry) => {
                    if !enqueue(&entry.handle.outbound, payload) {
                        evict(&mut sessions, &id);
                    }
                }
                None => tracing::debug!(session_id = %id, "Dropping message for unknown session"),
            },
            Command::Reclaim(id) => match sessions.remove(&id) {
                Some(_) => {
                    tracing::info!(session_id = %id, sessions = sessions.len(), "Viewer session reclaimed");
                }
                None => tracing::debug!(session_id = %id, "Session already reclaimed"),
            },
            Command::Count(reply) => {
                let _ = reply.send(sessions.len());
            }
            Command::State { id, reply } => {
                let state = sessions
                    .get(&id)
                    .map_or(SessionState::Reclaimed, |entry| entry.handle.state());
                let _ = reply.send(state);
            }
        }
    }

    tracing::debug!("Connection registry stopped");
}

/// Returns `false` when the queue is full.
fn enqueue(outbound: &mpsc::Sender<Bytes>, payload: Bytes) -> bool {
    match outbound.try_send(payload) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => false,
        // delivery loop already ended, reclaim is on its way
        Err(mpsc::error::TrySendError::Closed(_)) => true,
    }
}

fn evict(sessions: &mut HashMap<SessionId, Entry>, id: &SessionId) {
    if let Some(entry) = sessions.remove(id) {
        tracing::warn!(session_id = %id, "Outbound queue full, disconnecting slow viewer");
        // a session that never started goes away with its transport here
        entry.handle.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::transport::memory::{self, Peer};
    use std::time::Duration;
    use tokio::time::timeout;

    async fn recv(peer: &mut Peer) -> Option<Bytes> {
        timeout(Duration::from_secs(2), peer.received.recv())
            .await
            .expect("timed out waiting for a frame")
    }

    fn connect(registry: &ConnectionRegistry) -> (SessionId, Peer, tokio::task::JoinHandle<()>) {
        let (transport, peer) = memory::pair();
        let id = registry.add_client(transport);
        let handle = {
            let registry = registry.clone();
            let id = id.clone();
            tokio::spawn(async move { registry.start_client(&id).await })
        };
        (id, peer, handle)
    }

    #[tokio::test]
    async fn test_fan_out_reaches_every_session_in_order() {
        let registry = ConnectionRegistry::new(RegistryConfig::default());
        let mut viewers: Vec<_> = (0..10).map(|_| connect(&registry)).collect();
        assert_eq!(registry.session_count().await, 10);

        for n in 0..5 {
            registry.send_message_to_all(Bytes::from(format!("update {n}")));
        }

        for (_, peer, _) in viewers.iter_mut() {
            for n in 0..5 {
                assert_eq!(recv(peer).await.unwrap(), format!("update {n}").as_str());
            }
        }
    }

    #[tokio::test]
    async fn test_send_to_one_only_reaches_that_session() {
        let registry = ConnectionRegistry::new(RegistryConfig::default());
        let (first, mut first_peer, _) = connect(&registry);
        let (_, mut second_peer, _) = connect(&registry);

        registry.send_message_to_one(Bytes::from_static(b"welcome"), &first);
        registry.send_message_to_all(Bytes::from_static(b"update"));

        assert_eq!(recv(&mut first_peer).await.unwrap(), "welcome");
        assert_eq!(recv(&mut first_peer).await.unwrap(), "update");
        assert_eq!(recv(&mut second_peer).await.unwrap(), "update");
    }

    #[tokio::test]
    async fn test_messages_queued_before_start_are_delivered_first() {
        let registry = ConnectionRegistry::new(RegistryConfig::default());
        let (transport, mut peer) = memory::pair();
        let id = registry.add_client(transport);

        registry.send_message_to_one(Bytes::from_static(b"snapshot"), &id);
        registry.send_message_to_all(Bytes::from_static(b"delta"));
        assert_eq!(registry.session_state(&id).await, SessionState::Created);

        let runner = {
            let registry = registry.clone();
            let id = id.clone();
            tokio::spawn(async move { registry.start_client(&id).await })
        };

        assert_eq!(recv(&mut peer).await.unwrap(), "snapshot");
        assert_eq!(recv(&mut peer).await.unwrap(), "delta");
        assert_eq!(registry.session_state(&id).await, SessionState::Running);

        peer.disconnect();
        timeout(Duration::from_secs(2), runner).await.unwrap().unwrap();
        assert_eq!(registry.session_state(&id).await, SessionState::Reclaimed);
    }

    #[tokio::test]
    async fn test_disconnected_session_is_reclaimed_and_others_keep_receiving() {
        let registry = ConnectionRegistry::new(RegistryConfig::default());
        let (_, leaving_peer, leaving) = connect(&registry);
        let (_, mut staying_peer, _) = connect(&registry);

        leaving_peer.disconnect();
        timeout(Duration::from_secs(2), leaving).await.unwrap().unwrap();
        assert_eq!(registry.session_count().await, 1);

        registry.send_message_to_all(Bytes::from_static(b"still here"));
        assert_eq!(recv(&mut staying_peer).await.unwrap(), "still here");
    }

    #[tokio::test]
    async fn test_failed_write_only_terminates_that_session() {
        let registry = ConnectionRegistry::new(RegistryConfig::default());
        let (broken, _broken_peer) = memory::broken_pair();
        let broken_id = registry.add_client(broken);
        let broken_runner = {
            let registry = registry.clone();
            let id = broken_id.clone();
            tokio::spawn(async move { registry.start_client(&id).await })
        };
        let (_, mut healthy_peer, _) = connect(&registry);

        registry.send_message_to_all(Bytes::from_static(b"first"));
        timeout(Duration::from_secs(2), broken_runner).await.unwrap().unwrap();
        registry.send_message_to_all(Bytes::from_static(b"second"));

        assert_eq!(recv(&mut healthy_peer).await.unwrap(), "first");
        assert_eq!(recv(&mut healthy_peer).await.unwrap(), "second");
        assert_eq!(registry.session_state(&broken_id).await, SessionState::Reclaimed);
        assert_eq!(registry.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_reclaim_is_idempotent() {
        let registry = ConnectionRegistry::new(RegistryConfig::default());
        let (id, peer, runner) = connect(&registry);

        peer.disconnect();
        timeout(Duration::from_secs(2), runner).await.unwrap().unwrap();

        registry.send(Command::Reclaim(id.clone()));
        registry.send(Command::Reclaim(SessionId::generate()));

        assert_eq!(registry.session_count().await, 0);
        registry.send_message_to_one(Bytes::from_static(b"late"), &id);
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_overflowing_session_is_evicted() {
        let registry = ConnectionRegistry::new(RegistryConfig { queue_capacity: 2 });
        let (transport, mut slow_peer) = memory::pair();
        let slow = registry.add_client(transport);
        let (_, mut fast_peer, _) = connect(&registry);

        // the slow session is never started, so its queue fills up while the
        // fast one keeps draining
        for n in 0..3 {
            registry.send_message_to_all(Bytes::from(format!("update {n}")));
            assert_eq!(recv(&mut fast_peer).await.unwrap(), format!("update {n}").as_str());
        }

        assert_eq!(registry.session_state(&slow).await, SessionState::Reclaimed);
        assert_eq!(registry.session_count().await, 1);
        // evicting drops the never-started session together with its transport
        assert!(recv(&mut slow_peer).await.is_none());

        // starting an evicted session returns immediately
        timeout(Duration::from_secs(2), registry.start_client(&slow))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_overflowing_running_session_is_disconnected() {
        let registry = ConnectionRegistry::new(RegistryConfig { queue_capacity: 2 });
        let (transport, mut stalled_peer) = memory::stalled_pair();
        let stalled = registry.add_client(transport);
        let stalled_runner = {
            let registry = registry.clone();
            let id = stalled.clone();
            tokio::spawn(async move { registry.start_client(&id).await })
        };
        while registry.session_state(&stalled).await != SessionState::Running {
            tokio::task::yield_now().await;
        }
        let (_, mut fast_peer, _) = connect(&registry);

        // the stalled viewer blocks on its first write while the rest piles up
        for n in 0..5 {
            registry.send_message_to_all(Bytes::from(format!("update {n}")));
            assert_eq!(recv(&mut fast_peer).await.unwrap(), format!("update {n}").as_str());
        }

        timeout(Duration::from_secs(2), stalled_runner)
            .await
            .expect("evicted session kept its transport open")
            .unwrap();
        assert!(recv(&mut stalled_peer).await.is_none());
        assert_eq!(registry.session_state(&stalled).await, SessionState::Reclaimed);
        assert_eq!(registry.session_count().await, 1);

        registry.send_message_to_all(Bytes::from_static(b"after eviction"));
        assert_eq!(recv(&mut fast_peer).await.unwrap(), "after eviction");
    }
}
