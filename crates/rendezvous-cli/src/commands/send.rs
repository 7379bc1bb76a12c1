//! `rdv send <kind> <target> <body> --from <identity>`: relay one message.
//!
//! The relay gives no delivery receipt: a message for an unknown target is
//! dropped without notice.

use anyhow::{Context, Result};
use rendezvous_core::{Body, Signal, SignalKind, WireFormat};

pub async fn run(
    url: &str,
    format: WireFormat,
    kind: &str,
    target: &str,
    body: &str,
    from: &str,
) -> Result<()> {
    let signal = build_signal(kind, target, body, from)?;
    let kind = signal.kind;

    let client = super::connect(url, format).await?;
    client
        .send_signal_as(signal)
        .await
        .with_context(|| format!("failed to send {kind}"))?;
    client
        .disconnect()
        .await
        .context("failed to close connection")?;

    println!("sent {kind} to {target}");
    Ok(())
}

/// Validate arguments before touching the network.
fn build_signal(kind: &str, target: &str, body: &str, from: &str) -> Result<Signal> {
    let kind: SignalKind = kind.parse().map_err(anyhow::Error::msg)?;
    if target.is_empty() {
        anyhow::bail!("empty target");
    }
    let body = Body::from_json_str(body).context("body is not valid JSON")?;
    Ok(Signal {
        kind,
        target: target.to_string(),
        from: from.to_string(),
        body,
    })
}
