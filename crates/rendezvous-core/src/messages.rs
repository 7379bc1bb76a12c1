//! Signaling messages exchanged between peers and the relay.
//!
//! Every message is an object discriminated by a kebab-case `type` field, e.g.
//! `{"type":"register","identity":"peer1"}`. The same structure is used for
//! JSON text frames and CBOR binary frames.
//!
//! Decoding reads a frame into one flat struct and dispatches on `type` by
//! hand. Serde's tagged-enum support buffers the input first, which would
//! throw away the exact text of JSON bodies.

use crate::body::Body;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Protocol version string.
pub const PROTOCOL_VERSION: &str = "rendezvous-v1";

/// Error code: inbound frame could not be decoded.
pub const ERR_MALFORMED: u16 = 400;
/// Error code: inbound frame exceeded the configured size limit.
pub const ERR_FRAME_TOO_LARGE: u16 = 413;

// ── Client → relay ────────────────────────────────────────────────────

/// Messages a peer sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Register(RegisterPayload),
    ListPeers(ListPeersPayload),
    Offer(OfferPayload),
    Answer(AnswerPayload),
    IceCandidate(IceCandidatePayload),
}

impl ClientMessage {
    /// Wire name of this message's `type`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Register(_) => "register",
            Self::ListPeers(_) => "list-peers",
            Self::Offer(_) => SignalKind::Offer.as_str(),
            Self::Answer(_) => SignalKind::Answer.as_str(),
            Self::IceCandidate(_) => SignalKind::IceCandidate.as_str(),
        }
    }

    /// Convert a negotiation message into its kind-agnostic form.
    ///
    /// Returns `None` for `register` and `list-peers`.
    pub fn into_signal(self) -> Option<Signal> {
        match self {
            Self::Offer(p) => Some(Signal {
                kind: SignalKind::Offer,
                target: p.target,
                from: p.from,
                body: p.offer,
            }),
            Self::Answer(p) => Some(Signal {
                kind: SignalKind::Answer,
                target: p.target,
                from: p.from,
                body: p.answer,
            }),
            Self::IceCandidate(p) => Some(Signal {
                kind: SignalKind::IceCandidate,
                target: p.target,
                from: p.from,
                body: p.candidate,
            }),
            Self::Register(_) | Self::ListPeers(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPayload {
    pub identity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPeersPayload {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferPayload {
    pub target: String,
    pub from: String,
    pub offer: Body,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerPayload {
    pub target: String,
    pub from: String,
    pub answer: Body,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceCandidatePayload {
    pub target: String,
    pub from: String,
    pub candidate: Body,
}

// ── Relay → client ────────────────────────────────────────────────────

/// Messages the relay sends to a peer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    PeersList(PeersListPayload),
    PeerJoined(PeerPayload),
    PeerLeft(PeerPayload),
    Offer(OfferDelivery),
    Answer(AnswerDelivery),
    IceCandidate(IceCandidateDelivery),
    Error(ErrorPayload),
}

impl ServerMessage {
    /// Wire name of this message's `type`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PeersList(_) => "peers-list",
            Self::PeerJoined(_) => "peer-joined",
            Self::PeerLeft(_) => "peer-left",
            Self::Offer(_) => SignalKind::Offer.as_str(),
            Self::Answer(_) => SignalKind::Answer.as_str(),
            Self::IceCandidate(_) => SignalKind::IceCandidate.as_str(),
            Self::Error(_) => "error",
        }
    }

    pub fn peers_list(peers: Vec<String>) -> Self {
        Self::PeersList(PeersListPayload { peers })
    }

    pub fn peer_joined(identity: impl Into<String>) -> Self {
        Self::PeerJoined(PeerPayload {
            identity: identity.into(),
        })
    }

    pub fn peer_left(identity: impl Into<String>) -> Self {
        Self::PeerLeft(PeerPayload {
            identity: identity.into(),
        })
    }

    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            code,
            message: message.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeersListPayload {
    pub peers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerPayload {
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferDelivery {
    pub from: String,
    pub offer: Body,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerDelivery {
    pub from: String,
    pub answer: Body,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceCandidateDelivery {
    pub from: String,
    pub candidate: Body,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: u16,
    pub message: String,
}

// ── Decoding ──────────────────────────────────────────────────────────

/// Every field any message may carry. Unknown fields are ignored.
#[derive(Deserialize)]
struct WireFrame {
    #[serde(rename = "type")]
    kind: String,
    identity: Option<String>,
    target: Option<String>,
    from: Option<String>,
    peers: Option<Vec<String>>,
    code: Option<u16>,
    message: Option<String>,
    #[serde(default, deserialize_with = "present")]
    offer: Option<Body>,
    #[serde(default, deserialize_with = "present")]
    answer: Option<Body>,
    #[serde(default, deserialize_with = "present")]
    candidate: Option<Body>,
}

/// A body field that is present, `null` included.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Body>, D::Error> {
    Body::deserialize(deserializer).map(Some)
}

fn required<T>(value: Option<T>, kind: &str, field: &str) -> Result<T, String> {
    value.ok_or_else(|| format!("`{kind}` message without `{field}`"))
}

impl WireFrame {
    fn into_client(self) -> Result<ClientMessage, String> {
        let kind = self.kind.as_str();
        Ok(match kind {
            "register" => ClientMessage::Register(RegisterPayload {
                identity: required(self.identity, kind, "identity")?,
            }),
            "list-peers" => ClientMessage::ListPeers(ListPeersPayload {}),
            "offer" => ClientMessage::Offer(OfferPayload {
                target: required(self.target, kind, "target")?,
                from: required(self.from, kind, "from")?,
                offer: required(self.offer, kind, "offer")?,
            }),
            "answer" => ClientMessage::Answer(AnswerPayload {
                target: required(self.target, kind, "target")?,
                from: required(self.from, kind, "from")?,
                answer: required(self.answer, kind, "answer")?,
            }),
            "ice-candidate" => ClientMessage::IceCandidate(IceCandidatePayload {
                target: required(self.target, kind, "target")?,
                from: required(self.from, kind, "from")?,
                candidate: required(self.candidate, kind, "candidate")?,
            }),
            other => return Err(format!("unknown message type `{other}`")),
        })
    }

    fn into_server(self) -> Result<ServerMessage, String> {
        let kind = self.kind.as_str();
        Ok(match kind {
            "peers-list" => ServerMessage::peers_list(required(self.peers, kind, "peers")?),
            "peer-joined" => ServerMessage::peer_joined(required(self.identity, kind, "identity")?),
            "peer-left" => ServerMessage::peer_left(required(self.identity, kind, "identity")?),
            "offer" => ServerMessage::Offer(OfferDelivery {
                from: required(self.from, kind, "from")?,
                offer: required(self.offer, kind, "offer")?,
            }),
            "answer" => ServerMessage::Answer(AnswerDelivery {
                from: required(self.from, kind, "from")?,
                answer: required(self.answer, kind, "answer")?,
            }),
            "ice-candidate" => ServerMessage::IceCandidate(IceCandidateDelivery {
                from: required(self.from, kind, "from")?,
                candidate: required(self.candidate, kind, "candidate")?,
            }),
            "error" => ServerMessage::error(
                required(self.code, kind, "code")?,
                required(self.message, kind, "message")?,
            ),
            other => return Err(format!("unknown message type `{other}`")),
        })
    }
}

impl<'de> Deserialize<'de> for ClientMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        WireFrame::deserialize(deserializer)?
            .into_client()
            .map_err(D::Error::custom)
    }
}

impl<'de> Deserialize<'de> for ServerMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        WireFrame::deserialize(deserializer)?
            .into_server()
            .map_err(D::Error::custom)
    }
}

// ── Kind-agnostic negotiation message ─────────────────────────────────

/// The three negotiation message kinds the relay forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SignalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "offer" => Ok(Self::Offer),
            "answer" => Ok(Self::Answer),
            "ice-candidate" | "candidate" => Ok(Self::IceCandidate),
            other => Err(format!("unknown signal kind: {other}")),
        }
    }
}

/// An offer, answer or ICE candidate addressed to `target`.
///
/// `from` is whatever the sender declared; the relay does not check it.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    pub target: String,
    pub from: String,
    pub body: Body,
}

impl Signal {
    /// The request a sender puts on the wire.
    pub fn into_request(self) -> ClientMessage {
        match self.kind {
            SignalKind::Offer => ClientMessage::Offer(OfferPayload {
                target: self.target,
                from: self.from,
                offer: self.body,
            }),
            SignalKind::Answer => ClientMessage::Answer(AnswerPayload {
                target: self.target,
                from: self.from,
                answer: self.body,
            }),
            SignalKind::IceCandidate => ClientMessage::IceCandidate(IceCandidatePayload {
                target: self.target,
                from: self.from,
                candidate: self.body,
            }),
        }
    }

    /// The message the target receives: `target` stripped, body untouched.
    pub fn into_delivery(self) -> ServerMessage {
        match self.kind {
            SignalKind::Offer => ServerMessage::Offer(OfferDelivery {
                from: self.from,
                offer: self.body,
            }),
            SignalKind::Answer => ServerMessage::Answer(AnswerDelivery {
                from: self.from,
                answer: self.body,
            }),
            SignalKind::IceCandidate => ServerMessage::IceCandidate(IceCandidateDelivery {
                from: self.from,
                candidate: self.body,
            }),
        }
    }
}
