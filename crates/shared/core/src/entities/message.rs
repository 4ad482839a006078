//! Protocol message and its JSON wire codec
//!
//! A frame is a UTF-8 JSON object:
//!
//! ```text
//! {"id": "<32 hex chars>", "kind": "<KIND>", "content": {"k": "v", ...} | null}
//! ```
//!
//! The codec validates the envelope only. Content shape is checked by the
//! handler for each kind.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{MessageId, MessageKind};
use crate::error::FormatError;

/// Flat string map carried by every message
pub type Content = BTreeMap<String, String>;

/// Wire envelope, before id and kind are validated
#[derive(Serialize, Deserialize)]
struct Frame<'a> {
    id: std::borrow::Cow<'a, str>,
    kind: std::borrow::Cow<'a, str>,
    content: Option<Content>,
}

/// One protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolMessage {
    pub id: MessageId,
    pub kind: MessageKind,
    pub content: Option<Content>,
}

impl ProtocolMessage {
    pub fn new(id: MessageId, kind: MessageKind, content: Option<Content>) -> Self {
        Self { id, kind, content }
    }

    /// Look up a content field
    pub fn field(&self, key: &str) -> Option<&str> {
        self.content
            .as_ref()
            .and_then(|content| content.get(key))
            .map(String::as_str)
    }

    /// Serialize to a UTF-8 JSON frame
    pub fn to_bytes(&self) -> Vec<u8> {
        let frame = Frame {
            id: self.id.to_hex().into(),
            kind: self.kind.as_str().into(),
            content: self.content.clone(),
        };
        // A struct of strings and a string map always serializes
        serde_json::to_vec(&frame).unwrap_or_default()
    }

    /// Parse a frame, rejecting any malformation as a [`FormatError`]
    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        let text = std::str::from_utf8(data).map_err(|e| FormatError::Utf8(e.to_string()))?;
        let frame: Frame<'_> =
            serde_json::from_str(text).map_err(|e| FormatError::Json(e.to_string()))?;

        Ok(Self {
            id: MessageId::from_hex(&frame.id)?,
            kind: frame.kind.parse()?,
            content: frame.content,
        })
    }
}

/// Build a [`Content`] map from key/value pairs
pub fn content<I, K, V>(pairs: I) -> Content
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
