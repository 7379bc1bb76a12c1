//! Relay router: registration, directory broadcast and signal forwarding.
//!
//! The router owns the peer registry together with the outbound queue of
//! every live session. Both sit behind one lock, so a registration or a
//! disconnect and the broadcasts it causes are one atomic step: any other
//! session's registration lands entirely before or entirely after it.
//!
//! Sends never block. Each session has a bounded queue drained by its own
//! connection task; a full or closed queue drops the message.

use super::registry::{PeerRegistry, Registration, SessionId};
use super::RouteError;
use rendezvous_core::{ServerMessage, Signal};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Outbound queue of one session.
pub type Outbox = mpsc::Sender<ServerMessage>;

#[derive(Default)]
struct RelayState {
    registry: PeerRegistry,
    sessions: HashMap<SessionId, Outbox>,
}

impl RelayState {
    /// Send to every live session except `except`. Returns the delivered count.
    fn broadcast(&self, except: SessionId, msg: &ServerMessage) -> usize {
        let mut delivered = 0;
        for (&session, outbox) in &self.sessions {
            if session == except {
                continue;
            }
            if push(session, outbox, msg.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    fn send_to(&self, session: SessionId, msg: ServerMessage) -> bool {
        match self.sessions.get(&session) {
            Some(outbox) => push(session, outbox, msg),
            None => false,
        }
    }
}

fn push(session: SessionId, outbox: &Outbox, msg: ServerMessage) -> bool {
    match outbox.try_send(msg) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(msg)) => {
            warn!(session = %session, kind = msg.type_name(), "outbound queue full, message dropped");
            false
        }
        Err(mpsc::error::TrySendError::Closed(msg)) => {
            debug!(session = %session, kind = msg.type_name(), "outbound queue closed, message dropped");
            false
        }
    }
}

/// The relay's routing core.
pub struct RelayRouter {
    state: RwLock<RelayState>,
    next_session: AtomicU64,
}

impl Default for RelayRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayRouter {
    /// Create a router with no sessions and an empty registry.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RelayState::default()),
            next_session: AtomicU64::new(1),
        }
    }

    /// Track a new live session and return its id.
    pub async fn open_session(&self, outbox: Outbox) -> SessionId {
        let session = SessionId(self.next_session.fetch_add(1, Ordering::Relaxed));
        self.state.write().await.sessions.insert(session, outbox);
        session
    }

    /// Forget a session and drop its binding, broadcasting `peer-left`.
    ///
    /// Returns the identity that left, or `None` if the session never held
    /// one (a silent no-op for the other peers).
    pub async fn close_session(&self, session: SessionId) -> Option<String> {
        let mut state = self.state.write().await;
        state.sessions.remove(&session);

        let Some(entry) = state.registry.unregister_by_session(session) else {
            debug!(session = %session, "{}", RouteError::SessionUntracked(session));
            return None;
        };

        let notified = state.broadcast(session, &ServerMessage::peer_left(entry.identity.clone()));
        if state.registry.is_empty() {
            debug!("registry is empty");
        }
        info!(
            session = %session,
            identity = %entry.identity,
            registered_for = ?entry.registered_at.elapsed(),
            notified,
            "peer left"
        );
        Some(entry.identity)
    }

    /// Bind `identity` to `session`.
    ///
    /// The caller receives `peers-list` with every other identity, then every
    /// other live session receives `peer-joined`. If the session gave up an
    /// earlier identity, `peer-left` for it goes out first.
    pub async fn register(
        &self,
        session: SessionId,
        identity: String,
    ) -> Result<Registration, RouteError> {
        let mut state = self.state.write().await;
        if !state.sessions.contains_key(&session) {
            return Err(RouteError::SessionUntracked(session));
        }

        let outcome = state.registry.register(identity.clone(), session);

        if let Some(released) = &outcome.released {
            state.broadcast(session, &ServerMessage::peer_left(released.clone()));
            info!(session = %session, identity = %released, "peer left (re-registered)");
        }

        let directory = state.registry.others(&identity);
        let peers = directory.len();
        state.send_to(session, ServerMessage::peers_list(directory));
        let notified = state.broadcast(session, &ServerMessage::peer_joined(identity.clone()));

        info!(
            session = %session,
            identity = %identity,
            peers,
            notified,
            registered = state.registry.len(),
            displaced = ?outcome.displaced,
            "peer registered"
        );
        Ok(outcome)
    }

    /// Send `session` the current directory, excluding its own identity.
    pub async fn list_peers(&self, session: SessionId) -> Result<Vec<String>, RouteError> {
        let state = self.state.read().await;
        let directory = match state.registry.identity_of(session) {
            Some(own) => state.registry.others(own),
            None => state.registry.identities(),
        };
        if state.send_to(session, ServerMessage::peers_list(directory.clone())) {
            Ok(directory)
        } else {
            Err(RouteError::Undeliverable(session))
        }
    }

    /// Forward an offer, answer or candidate to the session bound to its target.
    ///
    /// The body is passed through untouched and `from` is not checked against
    /// the sender's own registration.
    pub async fn relay(&self, signal: Signal) -> Result<SessionId, RouteError> {
        let state = self.state.read().await;
        let Some(target) = state.registry.resolve(&signal.target) else {
            return Err(RouteError::TargetUnresolved(signal.target));
        };

        let kind = signal.kind;
        let from = signal.from.clone();
        if !state.send_to(target, signal.into_delivery()) {
            return Err(RouteError::Undeliverable(target));
        }

        info!(kind = %kind, from = %from, target = %target, "signal forwarded");
        Ok(target)
    }

    /// Number of live sessions, registered or not.
    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }
}

#[cfg(test)]
impl RelayRouter {
    /// Current session for `identity`.
    pub async fn resolve(&self, identity: &str) -> Option<SessionId> {
        self.state.read().await.registry.resolve(identity)
    }

    /// All registered identities in join order.
    pub async fn peers(&self) -> Vec<String> {
        self.state.read().await.registry.identities()
    }
}
