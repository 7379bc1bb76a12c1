//! rendezvous-core: Shared protocol library for the rendezvous relay.
//!
//! Provides the signaling message types, the opaque payload type, the
//! JSON/CBOR frame codec and the error type shared by the relay server, client library and CLI.

pub mod body;
pub mod codec;
pub mod error;
pub mod messages;

// Re-export commonly used items at crate root.
pub use body::Body;
pub use codec::{decode, encode, EncodedFrame, WireFormat};
pub use error::{RendezvousError, RendezvousResult};
pub use messages::{ClientMessage, ServerMessage, Signal, SignalKind, PROTOCOL_VERSION};
