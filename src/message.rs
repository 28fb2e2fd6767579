//! Wire representation of a single encoded log event.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Tag key carrying the configured application name.
pub const APPLICATION_TAG: &str = "Type";

/// Encoding applied to a message body after formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    Zstd,
}

impl std::fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentEncoding::Zstd => write!(f, "zstd"),
        }
    }
}

/// One log event encoded for the wire.
///
/// The body is fixed at construction. Tags and the partition key stay
/// adjustable so the tagging hook can amend them before the message is moved
/// into the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedMessage {
    body: Vec<u8>,
    content_encoding: Option<ContentEncoding>,
    partition_key: String,
    tags: BTreeMap<String, String>,
}

impl EncodedMessage {
    /// Create a message with no tags.
    pub fn new(
        body: Vec<u8>,
        content_encoding: Option<ContentEncoding>,
        partition_key: impl Into<String>,
    ) -> Self {
        Self {
            body,
            content_encoding,
            partition_key: partition_key.into(),
            tags: BTreeMap::new(),
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn content_encoding(&self) -> Option<ContentEncoding> {
        self.content_encoding
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn set_partition_key(&mut self, partition_key: impl Into<String>) {
        self.partition_key = partition_key.into();
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.tags
    }

    /// Size of the message as it travels on the wire: the base64 length of
    /// the body plus the UTF-8 length of every tag key and value.
    ///
    /// Fixed envelope framing is not included; the per-message overhead of
    /// the size budget covers it.
    pub fn size_in_bytes(&self) -> usize {
        let tag_bytes: usize = self.tags.iter().map(|(k, v)| k.len() + v.len()).sum();
        wire_body_len(self.body.len()).saturating_add(tag_bytes)
    }
}

/// Length of a body of `len` bytes once base64 encoded.
pub fn wire_body_len(len: usize) -> usize {
    base64::encoded_len(len, true).unwrap_or(usize::MAX)
}

/// Total transport size of a set of messages.
pub fn total_size(messages: &[EncodedMessage]) -> usize {
    messages.iter().map(EncodedMessage::size_in_bytes).sum()
}
