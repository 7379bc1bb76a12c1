//! `rdv peers`: list who is registered on the relay.

use anyhow::{Context, Result};
use rendezvous_core::WireFormat;

pub async fn run(url: &str, format: WireFormat) -> Result<()> {
    let mut client = super::connect(url, format).await?;
    let peers = client.list_peers().await.context("failed to list peers")?;

    if peers.is_empty() {
        eprintln!("No peers registered on {url}");
    }
    for peer in &peers {
        println!("{peer}");
    }

    client
        .disconnect()
        .await
        .context("failed to close connection")?;
    Ok(())
}
