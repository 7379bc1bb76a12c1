//! Peer registry and signal router.

pub mod registry;
pub mod router;

pub use registry::SessionId;
pub use router::RelayRouter;

use thiserror::Error;

/// Why the router did not act on a request.
///
/// None of these reach the client: unresolved targets and untracked sessions
/// are dropped silently and only logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("target not registered: {0}")]
    TargetUnresolved(String),

    #[error("session not tracked: {0}")]
    SessionUntracked(SessionId),

    #[error("session {0} cannot accept messages")]
    Undeliverable(SessionId),
}
