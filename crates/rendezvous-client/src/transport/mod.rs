//! Transport layer for the rendezvous client.
//!
//! The relay only speaks WebSocket. Bare `host:port` addresses and
//! `http(s)://` URLs are mapped onto the matching `ws(s)://` scheme.

pub mod websocket;

pub use websocket::WebSocketSession;

use rendezvous_core::{RendezvousError, RendezvousResult};

/// Turn user input into a WebSocket URL.
pub fn normalize_url(input: &str) -> RendezvousResult<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(RendezvousError::Transport("empty relay URL".into()));
    }

    let lower = trimmed.to_lowercase();
    if lower.starts_with("ws://") || lower.starts_with("wss://") {
        Ok(trimmed.to_string())
    } else if lower.starts_with("http://") {
        Ok(format!("ws://{}", &trimmed["http://".len()..]))
    } else if lower.starts_with("https://") {
        Ok(format!("wss://{}", &trimmed["https://".len()..]))
    } else if trimmed.contains("://") {
        Err(RendezvousError::Transport(format!(
            "unsupported URL scheme: {trimmed} (expected ws://, wss://, http:// or https://)"
        )))
    } else {
        Ok(format!("ws://{trimmed}"))
    }
}
