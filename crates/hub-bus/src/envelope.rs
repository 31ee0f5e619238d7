//! # Envelopes
//!
//! The addressed unit exchanged with the transport. Field names on the wire
//! match the interoperable shape:
//!
//! ```text
//! { "ID", "Topic", "Reply", "IsResponse", "Payload": { "error", "data" } }
//! ```
//!
//! `Payload.data` is carried as base64 in the JSON wire form.

use crate::serializer::SerializationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Application payload carried by an envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Handler-signalled error. Empty when the payload carries data.
    #[serde(rename = "error", default)]
    pub error: String,

    /// Serialized application value.
    #[serde(rename = "data", default, with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl Payload {
    #[must_use]
    pub fn data(data: Vec<u8>) -> Self {
        Self {
            error: String::new(),
            data,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            data: Vec::new(),
        }
    }

    /// Whether the payload carries an application error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// A message as seen by the transport.
///
/// `is_response` envelopes are never repliable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Globally unique message ID.
    #[serde(rename = "ID")]
    pub id: String,

    /// Destination subject.
    #[serde(rename = "Topic")]
    pub topic: String,

    /// Subject the recipient should answer on. Empty when no reply is expected.
    #[serde(rename = "Reply", default)]
    pub reply: String,

    #[serde(rename = "IsResponse", default)]
    pub is_response: bool,

    #[serde(rename = "Payload", default)]
    pub payload: Payload,
}

impl Envelope {
    /// Create an envelope with a fresh ID.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            topic: topic.into(),
            reply: String::new(),
            is_response: false,
            payload,
        }
    }

    /// A request expecting an answer on `reply`.
    #[must_use]
    pub fn request(topic: impl Into<String>, reply: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            reply: reply.into(),
            ..Self::new(topic, Payload::data(data))
        }
    }

    /// A response addressed to a reply subject.
    #[must_use]
    pub fn response(reply_to: impl Into<String>, payload: Payload) -> Self {
        Self {
            is_response: true,
            ..Self::new(reply_to, payload)
        }
    }

    /// Whether a recipient may answer this envelope.
    #[must_use]
    pub fn is_replyable(&self) -> bool {
        !self.is_response && !self.reply.is_empty()
    }

    /// Encode into the JSON wire form.
    pub fn to_wire(&self) -> Result<Vec<u8>, SerializationError> {
        serde_json::to_vec(self).map_err(|e| SerializationError::Encode(e.to_string()))
    }

    /// Decode from the JSON wire form.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, SerializationError> {
        serde_json::from_slice(bytes).map_err(|e| SerializationError::Decode(e.to_string()))
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
