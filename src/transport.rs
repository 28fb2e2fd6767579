//! Transport abstraction over the ingestion client.
//!
//! Two profiles exist. [`SizedTransport`] measures every message and reports
//! size accounting, so the dispatcher enforces the payload budget before
//! sending. [`BestEffortTransport`] has no size introspection; the dispatcher
//! sends whole batches and lets the endpoint decide.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::client::{EventEnvelope, IngestClient, TransportError};
use crate::message::{total_size, EncodedMessage};

/// Delivers encoded messages. Every send completes (or fails) before it returns.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether the transport measures per-message sizes.
    fn supports_size_accounting(&self) -> bool;

    /// Whether the direct path may gate compression on a size threshold.
    fn supports_compression_threshold(&self) -> bool {
        self.supports_size_accounting()
    }

    async fn send_one(&self, message: EncodedMessage) -> Result<(), TransportError>;

    async fn send_batch(&self, messages: Vec<EncodedMessage>) -> Result<(), TransportError>;
}

/// Which transport implementation the forwarder uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportProfile {
    /// Size-aware transport with budget enforcement
    Sized,

    /// Transport without size introspection
    BestEffort,
}

impl FromStr for TransportProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sized" => Ok(TransportProfile::Sized),
            "best-effort" | "best_effort" | "besteffort" => Ok(TransportProfile::BestEffort),
            other => Err(format!(
                "unknown transport profile '{}' (expected 'sized' or 'best-effort')",
                other
            )),
        }
    }
}

impl std::fmt::Display for TransportProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportProfile::Sized => write!(f, "sized"),
            TransportProfile::BestEffort => write!(f, "best-effort"),
        }
    }
}

/// Build the transport for `profile` over a shared client.
pub fn for_profile(
    profile: TransportProfile,
    client: IngestClient,
    message_limit: usize,
) -> Arc<dyn Transport> {
    match profile {
        TransportProfile::Sized => Arc::new(SizedTransport::new(client, message_limit)),
        TransportProfile::BestEffort => Arc::new(BestEffortTransport::new(client)),
    }
}

/// Size-aware transport.
///
/// Enforces its message limit on the serialized request body, the bytes that
/// actually go out, and refuses anything larger without touching the network.
/// The dispatcher budgets with [`EncodedMessage::size_in_bytes`], which
/// counts the same encoded body bytes.
#[derive(Debug, Clone)]
pub struct SizedTransport {
    client: IngestClient,
    message_limit: usize,
}

impl SizedTransport {
    pub fn new(client: IngestClient, message_limit: usize) -> Self {
        Self {
            client,
            message_limit,
        }
    }

    pub fn message_limit(&self) -> usize {
        self.message_limit
    }

    async fn deliver(&self, messages: &[EncodedMessage]) -> Result<(), TransportError> {
        let envelope = EventEnvelope::new(messages);
        let body = envelope.to_bytes()?;
        let size = body.len();
        if size > self.message_limit {
            return Err(TransportError::PayloadTooLarge {
                size,
                limit: self.message_limit,
            });
        }

        let response = self.client.post_bytes(envelope.partition_key, body).await?;
        debug!(
            events = messages.len(),
            size_bytes = size,
            measured_bytes = total_size(messages),
            accepted = response.accepted,
            rejected = response.rejected,
            "Delivered events"
        );
        Ok(())
    }
}

#[async_trait]
impl Transport for SizedTransport {
    fn supports_size_accounting(&self) -> bool {
        true
    }

    async fn send_one(&self, message: EncodedMessage) -> Result<(), TransportError> {
        self.deliver(std::slice::from_ref(&message)).await
    }

    async fn send_batch(&self, messages: Vec<EncodedMessage>) -> Result<(), TransportError> {
        self.deliver(&messages).await
    }
}

/// Transport without size introspection. Posts whatever it is given.
#[derive(Debug, Clone)]
pub struct BestEffortTransport {
    client: IngestClient,
}

impl BestEffortTransport {
    pub fn new(client: IngestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for BestEffortTransport {
    fn supports_size_accounting(&self) -> bool {
        false
    }

    async fn send_one(&self, message: EncodedMessage) -> Result<(), TransportError> {
        self.client
            .post(&EventEnvelope::new(std::slice::from_ref(&message)))
            .await?;
        Ok(())
    }

    async fn send_batch(&self, messages: Vec<EncodedMessage>) -> Result<(), TransportError> {
        let response = self.client.post(&EventEnvelope::new(&messages)).await?;
        debug!(
            events = messages.len(),
            accepted = response.accepted,
            "Delivered events"
        );
        Ok(())
    }
}
