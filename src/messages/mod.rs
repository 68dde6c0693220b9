//! The HTTP-shaped payloads carried over the broker.
//!
//! Packets travel as JSON in the AMQP message body. Correlation id and reply-to address
//! are not part of the packet: they travel in the AMQP basic properties.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Stamped on requests and responses with the id of the subscriber that handled them.
pub const SUBSCRIBER_ID_HEADER: &str = "subscriber-id";
/// Stamped on requests the broker has already delivered at least once.
pub const REDELIVERED_HEADER: &str = "redelivered";

/// Multi-valued headers, as in HTTP.
pub type Headers = BTreeMap<String, Vec<String>>;

const DEFAULT_VERSION: &str = "1.1";

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("Failed to decode packet")]
    Decode(#[source] serde_json::Error),
    #[error("Failed to encode packet")]
    Encode(#[source] serde_json::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RequestPacket {
    pub method: String,
    pub resource: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: Vec<u8>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResponsePacket {
    pub status_code: u16,
    #[serde(default)]
    pub status_description: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: Vec<u8>,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_owned()
}

impl RequestPacket {
    pub fn new(method: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            resource: resource.into(),
            version: default_version(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }

    pub fn serialize(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(CodecError::Encode)
    }

    /// Replace every value of header `name` with `value`.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_owned(), vec![value.into()]);
    }

    /// First value of header `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        first_value(&self.headers, name)
    }
}

impl ResponsePacket {
    pub fn new(status_code: u16, status_description: impl Into<String>) -> Self {
        Self {
            status_code,
            status_description: status_description.into(),
            version: default_version(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }

    pub fn serialize(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(CodecError::Encode)
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_owned(), vec![value.into()]);
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        first_value(&self.headers, name)
    }
}

fn first_value<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|values| values.first())
        .map(String::as_str)
}
