//! rendezvous-client: Rust client library for the rendezvous signaling relay.
//!
//! Connects over WebSocket, registers an identity, and exchanges offers,
//! answers and ICE candidates with other peers through the relay.
//!
//! # Quick Start
//!
//! ```no_run
//! use rendezvous_client::{ConnectConfig, RendezvousClient};
//! use rendezvous_core::{Body, ServerMessage};
//!
//! # async fn example() -> rendezvous_core::RendezvousResult<()> {
//! let mut client = RendezvousClient::connect("ws://127.0.0.1:3000", ConnectConfig::default()).await?;
//! let peers = client.register("alice").await?;
//!
//! if let Some(bob) = peers.first() {
//!     client.send_offer(bob, Body::from_json_str(r#"{"sdp":"v=0..."}"#)?).await?;
//! }
//!
//! while let Some(event) = client.next_event().await {
//!     if let ServerMessage::Answer(answer) = event {
//!         println!("answer from {}", answer.from);
//!         break;
//!     }
//! }
//!
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod transport;

// Re-export primary public types.
pub use client::{ConnectConfig, RendezvousClient};
pub use transport::{normalize_url, WebSocketSession};

// Re-export rendezvous-core error types for convenience.
pub use rendezvous_core::{Body, RendezvousError, RendezvousResult};
