//! HTTP client for posting event envelopes to the ingestion endpoint.
//!
//! The client performs exactly one request per call. Delivery retries are a
//! policy of the direct sink, not of the wire client.

use std::collections::BTreeMap;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::message::{ContentEncoding, EncodedMessage};

/// Header carrying the envelope partition key.
pub const PARTITION_KEY_HEADER: &str = "X-Partition-Key";

/// Response from the event ingestion API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestResponse {
    /// Status message from the API
    #[serde(default)]
    pub status: String,

    /// Number of events accepted
    #[serde(default)]
    pub accepted: u64,

    /// Number of events rejected (if any)
    #[serde(default)]
    pub rejected: u64,
}

/// One message as it appears on the wire.
#[derive(Debug, Serialize)]
pub struct WireEvent<'a> {
    /// Base64 of the (possibly compressed) body
    pub body: String,

    /// Set when the body is compressed
    pub content_encoding: Option<ContentEncoding>,

    /// Metadata tags
    pub tags: &'a BTreeMap<String, String>,
}

impl<'a> From<&'a EncodedMessage> for WireEvent<'a> {
    fn from(message: &'a EncodedMessage) -> Self {
        Self {
            body: BASE64.encode(message.body()),
            content_encoding: message.content_encoding(),
            tags: message.tags(),
        }
    }
}

/// Request body: one or more events sharing a partition key.
#[derive(Debug, Serialize)]
pub struct EventEnvelope<'a> {
    pub partition_key: &'a str,
    pub events: Vec<WireEvent<'a>>,
}

impl<'a> EventEnvelope<'a> {
    /// Build an envelope keyed by the first message's partition key.
    pub fn new(messages: &'a [EncodedMessage]) -> Self {
        let partition_key = messages
            .first()
            .map(EncodedMessage::partition_key)
            .unwrap_or_default();

        Self {
            partition_key,
            events: messages.iter().map(WireEvent::from).collect(),
        }
    }

    /// Serialize the envelope to the exact request body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TransportError> {
        serde_json::to_vec(self).map_err(TransportError::Encode)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Errors that can occur while delivering messages.
#[derive(Debug)]
pub enum TransportError {
    /// HTTP request failed
    Request(reqwest::Error),

    /// Server returned an error status code
    Status { code: StatusCode, message: String },

    /// Failed to serialize the request envelope
    Encode(serde_json::Error),

    /// Failed to parse response body
    Parse(String),

    /// Request timeout
    Timeout,

    /// The payload exceeds what the transport accepts
    PayloadTooLarge { size: usize, limit: usize },

    /// Client configuration error
    Config(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Request(e) => write!(f, "HTTP request failed: {}", e),
            TransportError::Status { code, message } => {
                write!(f, "Server error ({}): {}", code, message)
            }
            TransportError::Encode(e) => write!(f, "Failed to serialize envelope: {}", e),
            TransportError::Parse(e) => write!(f, "Failed to parse response: {}", e),
            TransportError::Timeout => write!(f, "Request timed out"),
            TransportError::PayloadTooLarge { size, limit } => write!(
                f,
                "Payload of {} bytes exceeds the {} byte transport limit",
                size, limit
            ),
            TransportError::Config(e) => write!(f, "Client configuration error: {}", e),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Request(e) => Some(e),
            TransportError::Encode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Request(err)
        }
    }
}

/// HTTP client for the event ingestion endpoint.
///
/// The underlying `reqwest::Client` is reused for connection pooling and is
/// never reconfigured after construction.
#[derive(Debug, Clone)]
pub struct IngestClient {
    /// The underlying HTTP client
    client: Client,

    /// URL for the event ingestion endpoint
    events_url: String,

    /// Request timeout duration
    timeout: Duration,
}

impl IngestClient {
    /// Create a new client from the forwarder configuration.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Config` if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        Self::with_settings(config.events_url.clone(), config.request_timeout)
    }

    /// Create a new client with custom settings.
    pub fn with_settings(
        events_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| TransportError::Config(e.to_string()))?;

        Ok(Self {
            client,
            events_url: events_url.into(),
            timeout,
        })
    }

    /// Post one envelope and wait for the response.
    pub async fn post(&self, envelope: &EventEnvelope<'_>) -> Result<IngestResponse, TransportError> {
        debug!(
            events = envelope.len(),
            partition_key = %envelope.partition_key,
            url = %self.events_url,
            "Posting event envelope"
        );

        self.post_bytes(envelope.partition_key, envelope.to_bytes()?).await
    }

    /// Post an already serialized envelope body.
    pub async fn post_bytes(
        &self,
        partition_key: &str,
        body: Vec<u8>,
    ) -> Result<IngestResponse, TransportError> {
        let response = self
            .client
            .post(&self.events_url)
            .header(CONTENT_TYPE, "application/json")
            .header(PARTITION_KEY_HEADER, partition_key)
            .body(body)
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            if body.trim().is_empty() {
                return Ok(IngestResponse::default());
            }
            serde_json::from_str(&body).map_err(|e| TransportError::Parse(e.to_string()))
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            Err(TransportError::Status {
                code: status,
                message,
            })
        }
    }

    /// Get the configured events URL.
    pub fn events_url(&self) -> &str {
        &self.events_url
    }

    /// Get the request timeout duration.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::DEFAULT_MESSAGE_OVERHEAD_BYTES;
    use crate::message::APPLICATION_TAG;

    fn tagged_message(body: &[u8], key: &str) -> EncodedMessage {
        let mut message = EncodedMessage::new(body.to_vec(), None, key);
        message
            .tags_mut()
            .insert(APPLICATION_TAG.to_string(), "svc-a".to_string());
        message
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Timeout;
        assert_eq!(format!("{}", err), "Request timed out");

        let err = TransportError::Status {
            code: StatusCode::PAYLOAD_TOO_LARGE,
            message: "too big".to_string(),
        };
        assert!(format!("{}", err).contains("413"));
        assert!(format!("{}", err).contains("too big"));

        let err = TransportError::PayloadTooLarge {
            size: 300,
            limit: 200,
        };
        assert!(format!("{}", err).contains("300"));
    }

    #[test]
    fn test_client_creation() {
        let config = Config::default();
        let client = IngestClient::new(&config).unwrap();
        assert_eq!(client.events_url(), "http://localhost:8080/api/v1/events");
        assert_eq!(client.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_envelope_serialization() {
        let mut compressed = EncodedMessage::new(vec![1, 2, 3], Some(ContentEncoding::Zstd), "pk-7");
        compressed
            .tags_mut()
            .insert("Region".to_string(), "eu".to_string());
        let messages = vec![tagged_message(b"hello", "pk-7"), compressed];

        let envelope = EventEnvelope::new(&messages);
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["partition_key"], "pk-7");
        assert_eq!(json["events"][0]["body"], "aGVsbG8=");
        assert!(json["events"][0]["content_encoding"].is_null());
        assert_eq!(json["events"][0]["tags"]["Type"], "svc-a");
        assert_eq!(json["events"][1]["content_encoding"], "zstd");
        assert_eq!(json["events"][1]["tags"]["Region"], "eu");
    }

    #[test]
    fn test_envelope_bytes_track_message_size() {
        let mut message = tagged_message(&vec![3u8; 10_000], "pk-1");
        message
            .tags_mut()
            .insert("Region".to_string(), "eu-west-1".to_string());
        let messages = vec![message];

        let wire = EventEnvelope::new(&messages).to_bytes().unwrap().len();
        let measured = messages[0].size_in_bytes();

        assert!(wire >= measured);
        assert!(wire - measured <= DEFAULT_MESSAGE_OVERHEAD_BYTES);
    }

    #[test]
    fn test_empty_envelope() {
        let envelope = EventEnvelope::new(&[]);
        assert!(envelope.is_empty());
        assert_eq!(envelope.partition_key, "");
    }

    #[tokio::test]
    async fn test_post_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/events")
            .match_header(PARTITION_KEY_HEADER, "pk-1")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_body(r#"{"status": "accepted", "accepted": 1}"#)
            .create_async()
            .await;

        let client = IngestClient::with_settings(
            format!("{}/api/v1/events", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();

        let messages = vec![tagged_message(b"x", "pk-1")];
        let response = client.post(&EventEnvelope::new(&messages)).await.unwrap();

        assert_eq!(response.accepted, 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_post_accepts_empty_success_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/events")
            .with_status(202)
            .create_async()
            .await;

        let client = IngestClient::with_settings(
            format!("{}/api/v1/events", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();

        let messages = vec![tagged_message(b"x", "pk-1")];
        let response = client.post(&EventEnvelope::new(&messages)).await.unwrap();
        assert_eq!(response.accepted, 0);
    }

    #[tokio::test]
    async fn test_post_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/events")
            .with_status(413)
            .with_body("payload too large")
            .create_async()
            .await;

        let client = IngestClient::with_settings(
            format!("{}/api/v1/events", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();

        let messages = vec![tagged_message(b"x", "pk-1")];
        let err = client.post(&EventEnvelope::new(&messages)).await.unwrap_err();
        match err {
            TransportError::Status { code, message } => {
                assert_eq!(code, StatusCode::PAYLOAD_TOO_LARGE);
                assert_eq!(message, "payload too large");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_client_timeout_applies_to_requests() {
        // Accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = IngestClient::with_settings(
            format!("http://{}/api/v1/events", addr),
            Duration::from_millis(200),
        )
        .unwrap();

        let messages = vec![tagged_message(b"x", "pk-1")];
        let err = client.post(&EventEnvelope::new(&messages)).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout));
    }
}
