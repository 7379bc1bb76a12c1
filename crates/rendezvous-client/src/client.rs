//! `RendezvousClient`: register with the relay, learn peers, exchange signals.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::timeout;

use rendezvous_core::messages::{ListPeersPayload, RegisterPayload};
use rendezvous_core::{
    Body, ClientMessage, RendezvousError, RendezvousResult, ServerMessage, Signal, SignalKind,
    WireFormat,
};

use crate::transport::{normalize_url, WebSocketSession};

/// Connection options.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Frame encoding for outbound messages. The relay answers in kind.
    pub format: WireFormat,
    /// How long to wait for the relay to answer a request.
    pub timeout: Duration,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            format: WireFormat::Json,
            timeout: Duration::from_secs(10),
        }
    }
}

/// A connected rendezvous client.
///
/// Relay traffic that arrives while a request is waiting for its reply is
/// kept and handed out later by [`RendezvousClient::next_event`] in arrival
/// order.
///
/// Replies carry no request id. The relay answers one session's requests in
/// order, so a reply that shows up after its request timed out is matched
/// by counting: late `peers-list` frames are discarded and late `error`
/// frames are passed on as events instead of failing the next request.
pub struct RendezvousClient {
    transport: WebSocketSession,
    identity: Option<String>,
    pending: VecDeque<ServerMessage>,
    timeout: Duration,
    /// Replies still owed to requests that timed out.
    abandoned: usize,
}

impl RendezvousClient {
    /// Connect to a relay.
    pub async fn connect(url: &str, config: ConnectConfig) -> RendezvousResult<Self> {
        let url = normalize_url(url)?;
        let transport = WebSocketSession::connect(&url, config.format).await?;
        Ok(Self {
            transport,
            identity: None,
            pending: VecDeque::new(),
            timeout: config.timeout,
            abandoned: 0,
        })
    }

    /// Identity this client registered under, if any.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Change how long later requests wait for their reply.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Register under `identity` and return the peers already online.
    pub async fn register(&mut self, identity: &str) -> RendezvousResult<Vec<String>> {
        if identity.is_empty() {
            return Err(RendezvousError::InvalidMessage("identity must not be empty".into()));
        }
        self.transport
            .send(&ClientMessage::Register(RegisterPayload {
                identity: identity.to_string(),
            }))
            .await?;
        let peers = self.wait_for_peers().await?;
        self.identity = Some(identity.to_string());
        tracing::info!(identity, peers = peers.len(), "registered");
        Ok(peers)
    }

    /// Ask the relay who is online. The caller's own identity is excluded.
    pub async fn list_peers(&mut self) -> RendezvousResult<Vec<String>> {
        self.transport
            .send(&ClientMessage::ListPeers(ListPeersPayload {}))
            .await?;
        self.wait_for_peers().await
    }

    pub async fn send_offer(&self, target: &str, offer: Body) -> RendezvousResult<()> {
        self.send_signal(SignalKind::Offer, target, offer).await
    }

    pub async fn send_answer(&self, target: &str, answer: Body) -> RendezvousResult<()> {
        self.send_signal(SignalKind::Answer, target, answer).await
    }

    pub async fn send_candidate(&self, target: &str, candidate: Body) -> RendezvousResult<()> {
        self.send_signal(SignalKind::IceCandidate, target, candidate).await
    }

    /// Send a signal with the registered identity as `from`.
    pub async fn send_signal(
        &self,
        kind: SignalKind,
        target: &str,
        body: Body,
    ) -> RendezvousResult<()> {
        let from = self.identity.clone().ok_or_else(|| {
            RendezvousError::InvalidMessage(format!("register before sending {kind}"))
        })?;
        self.send_signal_as(Signal {
            kind,
            target: target.to_string(),
            from,
            body,
        })
        .await
    }

    /// Send a signal exactly as given, `from` included.
    ///
    /// The relay forwards `from` unchecked, so this works without registering.
    pub async fn send_signal_as(&self, signal: Signal) -> RendezvousResult<()> {
        tracing::debug!(kind = %signal.kind, target = %signal.target, "sending signal");
        self.transport.send(&signal.into_request()).await
    }

    /// Next message from the relay. `None` once the connection is closed.
    pub async fn next_event(&mut self) -> Option<ServerMessage> {
        if let Some(msg) = self.pending.pop_front() {
            return Some(msg);
        }
        loop {
            let msg = self.transport.recv().await?;
            if self.is_late_reply(&msg) && matches!(msg, ServerMessage::PeersList(_)) {
                continue;
            }
            return Some(msg);
        }
    }

    /// Close the connection.
    pub async fn disconnect(mut self) -> RendezvousResult<()> {
        self.transport.close().await
    }

    async fn wait_for_peers(&mut self) -> RendezvousResult<Vec<String>> {
        let deadline = self.timeout;
        let result = timeout(deadline, async {
            loop {
                let Some(msg) = self.transport.recv().await else {
                    return Err(RendezvousError::Transport(
                        "connection closed by relay".into(),
                    ));
                };
                if self.is_late_reply(&msg) {
                    if let ServerMessage::Error(_) = msg {
                        self.pending.push_back(msg);
                    }
                    continue;
                }
                match msg {
                    ServerMessage::PeersList(list) => return Ok(list.peers),
                    ServerMessage::Error(err) => {
                        return Err(RendezvousError::Other(format!(
                            "relay error {}: {}",
                            err.code, err.message
                        )))
                    }
                    other => self.pending.push_back(other),
                }
            }
        })
        .await;

        match result {
            Ok(reply) => reply,
            Err(_) => {
                self.abandoned += 1;
                Err(RendezvousError::Timeout)
            }
        }
    }

    /// Whether `msg` answers a request that already timed out.
    fn is_late_reply(&mut self, msg: &ServerMessage) -> bool {
        if self.abandoned == 0
            || !matches!(msg, ServerMessage::PeersList(_) | ServerMessage::Error(_))
        {
            return false;
        }
        self.abandoned -= 1;
        tracing::debug!(kind = msg.type_name(), owed = self.abandoned, "late reply");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    /// One-connection fake relay. Each inbound frame is passed to `reply`,
    /// whose answers are sent back as text frames. Every inbound frame is
    /// also forwarded to the returned receiver.
    async fn fake_relay<F>(reply: F) -> (String, tokio::sync::mpsc::Receiver<Message>)
    where
        F: Fn(&Value) -> Vec<Value> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, seen_rx) = tokio::sync::mpsc::channel(32);

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                let parsed: Option<Value> = match &msg {
                    Message::Text(t) => serde_json::from_str(t).ok(),
                    Message::Binary(b) => ciborium::from_reader(&b[..]).ok(),
                    _ => None,
                };
                let _ = seen_tx.send(msg).await;
                if let Some(value) = parsed {
                    for out in reply(&value) {
                        ws.send(Message::Text(out.to_string().into())).await.unwrap();
                    }
                }
            }
        });

        (format!("ws://{addr}"), seen_rx)
    }

    #[tokio::test]
    async fn register_returns_peers_and_keeps_earlier_events() {
        let (url, _seen) = fake_relay(|msg| {
            if msg["type"] == "register" {
                vec![
                    json!({"type": "peer-joined", "identity": "carol"}),
                    json!({"type": "peers-list", "peers": ["bob", "carol"]}),
                ]
            } else {
                vec![]
            }
        })
        .await;

        let mut client = RendezvousClient::connect(&url, ConnectConfig::default())
            .await
            .unwrap();
        let peers = client.register("alice").await.unwrap();
        assert_eq!(peers, vec!["bob", "carol"]);
        assert_eq!(client.identity(), Some("alice"));

        let event = client.next_event().await.unwrap();
        assert_eq!(event, ServerMessage::peer_joined("carol"));
        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn signals_carry_registered_identity() {
        let (url, mut seen) = fake_relay(|msg| {
            if msg["type"] == "register" {
                vec![json!({"type": "peers-list", "peers": []})]
            } else {
                vec![]
            }
        })
        .await;

        let mut client = RendezvousClient::connect(&url, ConnectConfig::default())
            .await
            .unwrap();
        client.register("alice").await.unwrap();
        client
            .send_candidate("bob", Body::from_json_str(r#"{"candidate":"c1"}"#).unwrap())
            .await
            .unwrap();

        let _register = seen.recv().await.unwrap();
        let frame = seen.recv().await.unwrap();
        let Message::Text(text) = frame else {
            panic!("expected a text frame");
        };
        let sent: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            sent,
            json!({
                "type": "ice-candidate",
                "target": "bob",
                "from": "alice",
                "candidate": {"candidate": "c1"},
            })
        );
    }

    #[tokio::test]
    async fn signal_before_register_is_refused() {
        let (url, _seen) = fake_relay(|_| vec![]).await;
        let client = RendezvousClient::connect(&url, ConnectConfig::default())
            .await
            .unwrap();
        let err = client
            .send_offer("bob", Body::from_value(&json!({})).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, RendezvousError::InvalidMessage(_)));
    }

    #[tokio::test]
    async fn cbor_config_sends_binary_frames() {
        let (url, mut seen) = fake_relay(|msg| {
            if msg["type"] == "list-peers" {
                vec![json!({"type": "peers-list", "peers": ["bob"]})]
            } else {
                vec![]
            }
        })
        .await;

        let config = ConnectConfig {
            format: WireFormat::Cbor,
            ..Default::default()
        };
        let mut client = RendezvousClient::connect(&url, config).await.unwrap();
        assert_eq!(client.list_peers().await.unwrap(), vec!["bob"]);
        assert!(matches!(seen.recv().await.unwrap(), Message::Binary(_)));
    }

    #[tokio::test]
    async fn relay_error_fails_the_request() {
        let (url, _seen) = fake_relay(|_| {
            vec![json!({"type": "error", "code": 400, "message": "malformed frame"})]
        })
        .await;

        let mut client = RendezvousClient::connect(&url, ConnectConfig::default())
            .await
            .unwrap();
        let err = client.list_peers().await.unwrap_err();
        assert!(err.to_string().contains("400"));
    }

    #[tokio::test]
    async fn silent_relay_times_out() {
        let (url, _seen) = fake_relay(|_| vec![]).await;
        let config = ConnectConfig {
            timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let mut client = RendezvousClient::connect(&url, config).await.unwrap();
        let err = client.register("alice").await.unwrap_err();
        assert!(matches!(err, RendezvousError::Timeout));
        assert_eq!(client.identity(), None);
    }

    #[tokio::test]
    async fn late_peers_list_is_not_taken_as_the_next_answer() {
        let calls = AtomicUsize::new(0);
        let (url, _seen) = fake_relay(move |msg| {
            if msg["type"] != "list-peers" {
                return vec![];
            }
            match calls.fetch_add(1, Ordering::SeqCst) {
                // First request goes unanswered until the second arrives.
                0 => vec![],
                _ => vec![
                    json!({"type": "peers-list", "peers": ["stale"]}),
                    json!({"type": "peers-list", "peers": ["fresh"]}),
                ],
            }
        })
        .await;

        let config = ConnectConfig {
            timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let mut client = RendezvousClient::connect(&url, config).await.unwrap();
        assert!(matches!(
            client.list_peers().await.unwrap_err(),
            RendezvousError::Timeout
        ));

        client.set_timeout(Duration::from_secs(5));
        assert_eq!(client.list_peers().await.unwrap(), vec!["fresh"]);
    }

    #[tokio::test]
    async fn late_error_becomes_an_event() {
        let calls = AtomicUsize::new(0);
        let (url, _seen) = fake_relay(move |msg| {
            if msg["type"] != "list-peers" {
                return vec![];
            }
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 => vec![],
                _ => vec![
                    json!({"type": "error", "code": 400, "message": "earlier frame"}),
                    json!({"type": "peers-list", "peers": ["bob"]}),
                ],
            }
        })
        .await;

        let config = ConnectConfig {
            timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let mut client = RendezvousClient::connect(&url, config).await.unwrap();
        assert!(client.list_peers().await.is_err());

        client.set_timeout(Duration::from_secs(5));
        assert_eq!(client.list_peers().await.unwrap(), vec!["bob"]);
        assert_eq!(
            client.next_event().await,
            Some(ServerMessage::error(400, "earlier frame"))
        );
    }
}
