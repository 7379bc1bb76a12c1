//! `rdv join <identity>`: register and stream relay events.
//!
//! Prints the initial peers list and then every relay message as one JSON
//! line on stdout until Ctrl+C or the relay closes the connection.

use anyhow::{Context, Result};
use rendezvous_core::{ServerMessage, WireFormat};
use tracing::{info, warn};

pub async fn run(url: &str, format: WireFormat, identity: &str) -> Result<()> {
    let mut client = super::connect(url, format).await?;
    let peers = client
        .register(identity)
        .await
        .with_context(|| format!("failed to register as '{identity}'"))?;

    info!(identity, peers = peers.len(), "joined relay");
    println!("{}", super::event_line(&ServerMessage::peers_list(peers))?);
    eprintln!("Joined {url} as {identity} (Ctrl+C to leave)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            event = client.next_event() => match event {
                Some(event) => match super::event_line(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!(kind = event.type_name(), error = %e, "event not printable as JSON"),
                },
                None => {
                    eprintln!("rdv: relay closed the connection");
                    return Ok(());
                }
            },
        }
    }

    client
        .disconnect()
        .await
        .context("failed to close connection")?;
    Ok(())
}
