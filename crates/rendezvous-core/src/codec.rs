//! Message codec for WebSocket frames.
//!
//! Text frames carry JSON, binary frames carry CBOR. A WebSocket frame is
//! already delimited, so neither encoding uses a length prefix.

use crate::error::RendezvousResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Cursor;

/// Encoding of a single frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WireFormat {
    /// UTF-8 JSON in a text frame.
    #[default]
    Json,
    /// CBOR in a binary frame.
    Cbor,
}

/// An encoded frame ready to hand to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedFrame {
    Text(String),
    Binary(Vec<u8>),
}

impl EncodedFrame {
    pub fn format(&self) -> WireFormat {
        match self {
            Self::Text(_) => WireFormat::Json,
            Self::Binary(_) => WireFormat::Cbor,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encode a value as a JSON string.
pub fn json_encode<T: Serialize>(value: &T) -> RendezvousResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Decode a JSON string into a typed value.
pub fn json_decode<T: DeserializeOwned>(text: &str) -> RendezvousResult<T> {
    Ok(serde_json::from_str(text)?)
}

/// Encode a value as CBOR bytes.
pub fn cbor_encode<T: Serialize>(value: &T) -> RendezvousResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(value, &mut payload)?;
    Ok(payload)
}

/// Decode CBOR bytes into a typed value.
pub fn cbor_decode<T: DeserializeOwned>(data: &[u8]) -> RendezvousResult<T> {
    let value: T = ciborium::from_reader(Cursor::new(data))?;
    Ok(value)
}

/// Encode a value in the given wire format.
pub fn encode<T: Serialize>(value: &T, format: WireFormat) -> RendezvousResult<EncodedFrame> {
    match format {
        WireFormat::Json => json_encode(value).map(EncodedFrame::Text),
        WireFormat::Cbor => cbor_encode(value).map(EncodedFrame::Binary),
    }
}

/// Decode a frame, choosing the decoder from the frame type.
pub fn decode<T: DeserializeOwned>(frame: &EncodedFrame) -> RendezvousResult<T> {
    match frame {
        EncodedFrame::Text(text) => json_decode(text),
        EncodedFrame::Binary(data) => cbor_decode(data),
    }
}
