//! Peer registry: identity → session bindings.
//!
//! Keeps a forward map keyed by identity and a back-index keyed by session so
//! that disconnect cleanup is a single lookup. The two maps always hold the
//! same set of bindings.

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;
use tracing::debug;

/// Opaque handle for a live transport session, assigned by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered peer.
#[derive(Debug, Clone)]
pub struct PeerEntry {
    /// Caller-chosen identity.
    pub identity: String,
    /// Session currently bound to the identity.
    pub session: SessionId,
    /// When the binding was made.
    pub registered_at: Instant,
    /// Join order, used to list peers deterministically.
    seq: u64,
}

/// What a `register` call changed besides inserting the new binding.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Session that held this identity before and lost it. It stays connected.
    pub displaced: Option<SessionId>,
    /// Identity this session held before registering under a new one.
    pub released: Option<String>,
}

/// Registry of identity bindings.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    by_identity: HashMap<String, PeerEntry>,
    by_session: HashMap<SessionId, String>,
    next_seq: u64,
}

impl PeerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `identity` to `session`, overwriting any earlier binding.
    ///
    /// A session holds at most one identity: registering a different name
    /// releases the old one first.
    pub fn register(&mut self, identity: String, session: SessionId) -> Registration {
        let mut outcome = Registration::default();

        if let Some(current) = self.by_session.get(&session) {
            if *current == identity {
                return outcome;
            }
            if let Some(released) = self.by_session.remove(&session) {
                self.by_identity.remove(&released);
                outcome.released = Some(released);
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let entry = PeerEntry {
            identity: identity.clone(),
            session,
            registered_at: Instant::now(),
            seq,
        };

        if let Some(previous) = self.by_identity.insert(identity.clone(), entry) {
            self.by_session.remove(&previous.session);
            outcome.displaced = Some(previous.session);
            debug!(identity = %identity, displaced = %previous.session, "identity overwritten");
        }
        self.by_session.insert(session, identity);

        outcome
    }

    /// Current session for `identity`.
    pub fn resolve(&self, identity: &str) -> Option<SessionId> {
        self.by_identity.get(identity).map(|e| e.session)
    }

    /// Identity bound to `session`, if any.
    pub fn identity_of(&self, session: SessionId) -> Option<&str> {
        self.by_session.get(&session).map(String::as_str)
    }

    /// Remove the binding owned by `session`.
    ///
    /// `None` when the session never registered or was displaced.
    pub fn unregister_by_session(&mut self, session: SessionId) -> Option<PeerEntry> {
        let identity = self.by_session.remove(&session)?;
        self.by_identity.remove(&identity)
    }

    /// All registered identities in join order.
    pub fn identities(&self) -> Vec<String> {
        let mut entries: Vec<&PeerEntry> = self.by_identity.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.identity.clone()).collect()
    }

    /// Registered identities except `identity`, in join order.
    pub fn others(&self, identity: &str) -> Vec<String> {
        let mut list = self.identities();
        list.retain(|id| id != identity);
        list
    }

    /// Number of registered identities.
    pub fn len(&self) -> usize {
        self.by_identity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identity.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(n: u64) -> SessionId {
        SessionId(n)
    }

    #[test]
    fn resolve_returns_latest_session() {
        let mut reg = PeerRegistry::new();
        assert!(reg.is_empty());
        reg.register("peer1".into(), s(1));
        reg.register("peer2".into(), s(2));
        reg.register("peer3".into(), s(3));

        assert_eq!(reg.resolve("peer1"), Some(s(1)));
        assert_eq!(reg.resolve("peer2"), Some(s(2)));
        assert_eq!(reg.resolve("peer3"), Some(s(3)));
        assert_eq!(reg.resolve("peer4"), None);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn duplicate_identity_overwrites() {
        let mut reg = PeerRegistry::new();
        reg.register("peer1".into(), s(1));
        let outcome = reg.register("peer1".into(), s(2));

        assert_eq!(outcome.displaced, Some(s(1)));
        assert_eq!(outcome.released, None);
        assert_eq!(reg.resolve("peer1"), Some(s(2)));
        assert_eq!(reg.identity_of(s(1)), None);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn displaced_session_disconnect_keeps_new_binding() {
        let mut reg = PeerRegistry::new();
        reg.register("peer1".into(), s(1));
        reg.register("peer1".into(), s(2));

        assert!(reg.unregister_by_session(s(1)).is_none());
        assert_eq!(reg.resolve("peer1"), Some(s(2)));
    }

    #[test]
    fn same_session_same_identity_is_idempotent() {
        let mut reg = PeerRegistry::new();
        reg.register("peer1".into(), s(1));
        let outcome = reg.register("peer1".into(), s(1));

        assert_eq!(outcome, Registration::default());
        assert_eq!(reg.resolve("peer1"), Some(s(1)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn new_identity_releases_old_one() {
        let mut reg = PeerRegistry::new();
        reg.register("alice".into(), s(1));
        let outcome = reg.register("bob".into(), s(1));

        assert_eq!(outcome.released.as_deref(), Some("alice"));
        assert_eq!(reg.resolve("alice"), None);
        assert_eq!(reg.resolve("bob"), Some(s(1)));
        assert_eq!(reg.identity_of(s(1)), Some("bob"));
    }

    #[test]
    fn unregister_by_session() {
        let mut reg = PeerRegistry::new();
        reg.register("peer1".into(), s(1));
        reg.register("peer2".into(), s(2));

        let entry = reg.unregister_by_session(s(2)).unwrap();
        assert_eq!(entry.identity, "peer2");
        assert_eq!(entry.session, s(2));
        assert_eq!(reg.resolve("peer2"), None);
        assert_eq!(reg.identities(), vec!["peer1".to_string()]);
    }

    #[test]
    fn unregister_untracked_session_is_noop() {
        let mut reg = PeerRegistry::new();
        reg.register("peer1".into(), s(1));
        assert!(reg.unregister_by_session(s(9)).is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn others_excludes_self_and_keeps_join_order() {
        let mut reg = PeerRegistry::new();
        reg.register("c".into(), s(1));
        reg.register("a".into(), s(2));
        reg.register("b".into(), s(3));

        assert_eq!(reg.identities(), vec!["c", "a", "b"]);
        assert_eq!(reg.others("a"), vec!["c", "b"]);
        assert_eq!(reg.others("zzz"), vec!["c", "a", "b"]);
    }

    #[test]
    fn indexes_stay_in_sync() {
        let mut reg = PeerRegistry::new();
        reg.register("x".into(), s(1));
        reg.register("y".into(), s(2));
        reg.register("x".into(), s(2));
        reg.register("z".into(), s(1));

        // s(2) released "y" and took "x" from s(1); s(1) then took "z".
        assert_eq!(reg.resolve("x"), Some(s(2)));
        assert_eq!(reg.resolve("y"), None);
        assert_eq!(reg.resolve("z"), Some(s(1)));
        for id in reg.identities() {
            let session = reg.resolve(&id).unwrap();
            assert_eq!(reg.identity_of(session), Some(id.as_str()));
        }
    }
}
