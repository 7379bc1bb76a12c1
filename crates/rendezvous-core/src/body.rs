//! Opaque negotiation payloads.
//!
//! A body stays in the encoding it arrived in. JSON bodies keep their exact
//! source text, so number spelling and key order survive the relay. CBOR
//! bodies keep every CBOR data item, byte strings and tags included.
//!
//! A body changes form only when it has to cross encodings (a JSON sender
//! talking to a CBOR receiver or the reverse). It is then converted through
//! the shared data model; items the target encoding cannot express make
//! encoding fail.

use crate::error::RendezvousResult;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

/// Payload of an offer, answer or ICE candidate.
#[derive(Debug, Clone)]
pub enum Body {
    /// Exact JSON text from a text frame.
    Json(Box<RawValue>),
    /// Decoded CBOR item from a binary frame.
    Cbor(ciborium::Value),
}

impl Body {
    /// Wrap JSON text, keeping it byte for byte (outer whitespace aside).
    pub fn from_json_str(text: &str) -> RendezvousResult<Self> {
        Ok(Self::Json(RawValue::from_string(text.trim().to_string())?))
    }

    /// Compact JSON rendering of `value`.
    pub fn from_value(value: &serde_json::Value) -> RendezvousResult<Self> {
        Ok(Self::Json(serde_json::value::to_raw_value(value)?))
    }

    pub fn from_cbor(value: ciborium::Value) -> Self {
        Self::Cbor(value)
    }

    /// Source text of a JSON body.
    pub fn as_json_str(&self) -> Option<&str> {
        match self {
            Self::Json(raw) => Some(raw.get()),
            Self::Cbor(_) => None,
        }
    }

    /// Parse the body into a `serde_json::Value`.
    pub fn to_json_value(&self) -> RendezvousResult<serde_json::Value> {
        match self {
            Self::Json(raw) => Ok(serde_json::from_str(raw.get())?),
            Self::Cbor(value) => Ok(serde_json::to_value(value)?),
        }
    }

    /// The body as a CBOR item.
    pub fn to_cbor_value(&self) -> RendezvousResult<ciborium::Value> {
        match self {
            Self::Json(raw) => Ok(serde_json::from_str(raw.get())?),
            Self::Cbor(value) => Ok(value.clone()),
        }
    }
}

impl PartialEq for Body {
    /// JSON bodies compare by text, CBOR bodies by item.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Json(a), Self::Json(b)) => a.get() == b.get(),
            (Self::Cbor(a), Self::Cbor(b)) => a == b,
            _ => false,
        }
    }
}

// serde_json reports itself human-readable and ciborium does not; that is
// what tells the two encodings apart here.

impl Serialize for Body {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Json(raw) if serializer.is_human_readable() => raw.serialize(serializer),
            Self::Json(raw) => {
                let value: ciborium::Value = serde_json::from_str(raw.get())
                    .map_err(serde::ser::Error::custom)?;
                value.serialize(serializer)
            }
            Self::Cbor(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Body {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            Box::<RawValue>::deserialize(deserializer)
                .map(Self::Json)
                .map_err(|e| D::Error::custom(format!("body: {e}")))
        } else {
            ciborium::Value::deserialize(deserializer).map(Self::Cbor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_text_is_kept_exactly() {
        let text = r#"{"type":"offer","sdp":"X","n":123456789012345678901234567890,"f":1.10}"#;
        let body = Body::from_json_str(text).unwrap();
        assert_eq!(body.as_json_str(), Some(text));
        assert_eq!(serde_json::to_string(&body).unwrap(), text);
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(Body::from_json_str("{nope").is_err());
    }

    #[test]
    fn from_value_is_compact() {
        let body = Body::from_value(&json!({"sdp": "X"})).unwrap();
        assert_eq!(body.as_json_str(), Some(r#"{"sdp":"X"}"#));
        assert_eq!(body.to_json_value().unwrap(), json!({"sdp": "X"}));
    }

    #[test]
    fn cbor_bytes_survive_a_cbor_round_trip() {
        let body = Body::from_cbor(ciborium::Value::Map(vec![
            (ciborium::Value::Integer(1.into()), ciborium::Value::Bytes(vec![1, 2, 3])),
            (ciborium::Value::Text("z".into()), ciborium::Value::Null),
        ]));
        let mut buf = Vec::new();
        ciborium::into_writer(&body, &mut buf).unwrap();
        let back: Body = ciborium::from_reader(&buf[..]).unwrap();
        assert_eq!(back, body);
    }

    #[test]
    fn json_body_converts_for_cbor_receivers() {
        let body = Body::from_json_str(r#"{"b":1,"a":[true,"x"]}"#).unwrap();
        let mut buf = Vec::new();
        ciborium::into_writer(&body, &mut buf).unwrap();
        let item: ciborium::Value = ciborium::from_reader(&buf[..]).unwrap();

        let ciborium::Value::Map(entries) = item else {
            panic!("expected a map");
        };
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_text().unwrap()).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn cbor_body_renders_as_json_when_possible() {
        let body = Body::from_cbor(ciborium::Value::Map(vec![(
            ciborium::Value::Text("sdp".into()),
            ciborium::Value::Text("X".into()),
        )]));
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"sdp":"X"}"#);

        let array_key = Body::from_cbor(ciborium::Value::Map(vec![(
            ciborium::Value::Array(vec![]),
            ciborium::Value::Null,
        )]));
        assert!(serde_json::to_string(&array_key).is_err());
    }
}
