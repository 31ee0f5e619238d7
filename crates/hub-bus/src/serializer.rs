//! # Serializers
//!
//! Pluggable codecs turning application values into payload bytes. The bus
//! only ever talks to [`BusSerializer`]; the concrete codec is chosen once at
//! construction through [`SerializationFormat`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from encoding or decoding payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SerializationError {
    #[error("Failed to encode payload: {0}")]
    Encode(String),

    #[error("Failed to decode payload: {0}")]
    Decode(String),
}

/// Codec between application values and payload bytes.
pub trait BusSerializer: Send + Sync {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, SerializationError>;

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, SerializationError>;
}

/// JSON codec (`serde_json`).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl BusSerializer for JsonSerializer {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, SerializationError> {
        serde_json::to_vec(value).map_err(|e| SerializationError::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, SerializationError> {
        serde_json::from_slice(data).map_err(|e| SerializationError::Decode(e.to_string()))
    }
}

/// Compact binary codec (`bincode`).
#[derive(Debug, Clone, Copy, Default)]
pub struct BinarySerializer;

impl BusSerializer for BinarySerializer {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, SerializationError> {
        bincode::serialize(value).map_err(|e| SerializationError::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, SerializationError> {
        bincode::deserialize(data).map_err(|e| SerializationError::Decode(e.to_string()))
    }
}

/// Codec selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    #[default]
    Json,
    Binary,
}

impl SerializationFormat {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Binary => "binary",
        }
    }
}

impl BusSerializer for SerializationFormat {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, SerializationError> {
        match self {
            Self::Json => JsonSerializer.encode(value),
            Self::Binary => BinarySerializer.encode(value),
        }
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, SerializationError> {
        match self {
            Self::Json => JsonSerializer.decode(data),
            Self::Binary => BinarySerializer.decode(data),
        }
    }
}

impl FromStr for SerializationFormat {
    type Err = Infallible;

    /// Unknown names select JSON.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "binary" | "bincode" => Self::Binary,
            _ => Self::Json,
        })
    }
}

impl fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
