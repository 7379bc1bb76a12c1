//! CLI subcommand implementations.

pub mod join;
pub mod peers;
pub mod send;

use anyhow::{Context, Result};
use rendezvous_client::{ConnectConfig, RendezvousClient};
use rendezvous_core::{ServerMessage, WireFormat};
use tracing::debug;

/// Connect to the relay at `url`.
pub(crate) async fn connect(url: &str, format: WireFormat) -> Result<RendezvousClient> {
    debug!(url = %url, ?format, "connecting to relay");
    RendezvousClient::connect(
        url,
        ConnectConfig {
            format,
            ..Default::default()
        },
    )
    .await
    .with_context(|| format!("failed to connect to {url}"))
}

/// One relay event as a single JSON line.
pub(crate) fn event_line(event: &ServerMessage) -> Result<String> {
    serde_json::to_string(event).context("failed to encode event")
}
