//! Log Forwarder Library
//!
//! This library converts structured log events into wire messages and delivers
//! them to an event-ingestion endpoint without exceeding the transport's
//! per-request payload ceiling:
//!
//! - **event**: Structured log events and property values
//! - **formatter**: Pluggable event formatters (typed JSON, plain text)
//! - **encoder**: Event to wire message: format, compress, tag, partition key
//! - **budget**: Payload size budget for a batch of N messages
//! - **dispatcher**: Batch delivery with per-event fallback
//! - **sink**: Single-event delivery with error containment
//! - **transport** / **client**: Size-aware and best-effort HTTP transports
//! - **scheduler**: Size and time based batching loop
//! - **config**: Environment-based configuration
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use log_forwarder::config::Config;
//! use log_forwarder::event::{LogEvent, LogLevel};
//! use log_forwarder::forwarder::{self, ForwarderOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let dispatcher = forwarder::build(&config, ForwarderOptions::default())
//!         .expect("Failed to create transport");
//!
//!     let events = vec![
//!         LogEvent::new(LogLevel::Info, "User {UserId} logged in").with_property("UserId", 42),
//!         LogEvent::new(LogLevel::Warn, "Cache miss ratio {Ratio}").with_property("Ratio", 0.4),
//!     ];
//!
//!     dispatcher.dispatch(&events).await.expect("Failed to encode batch");
//! }
//! ```

// Module declarations
pub mod budget;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod encoder;
pub mod event;
pub mod formatter;
pub mod forwarder;
pub mod message;
pub mod scheduler;
pub mod self_log;
pub mod sink;
pub mod transport;

// Re-export commonly used types at crate root for convenience
pub use budget::SizeBudget;
pub use client::{IngestClient, IngestResponse, TransportError};
pub use config::{Config, ConfigError};
pub use dispatcher::{
    BatchDispatcher, DegradeReason, DispatchError, DispatchOutcome, FallbackSummary,
};
pub use encoder::{CompressionMode, CompressionPolicy, EncodeError, EventEncoder, TaggingHook};
pub use event::{LogEvent, LogLevel, PropertyValue};
pub use formatter::{EventFormatter, FormatError, FormatterKind, TextFormatter, TypedJsonFormatter};
pub use forwarder::ForwarderOptions;
pub use message::{ContentEncoding, EncodedMessage, APPLICATION_TAG};
pub use scheduler::{run_batching, SchedulerStats};
pub use self_log::SelfLog;
pub use sink::{Delivery, DirectSink};
pub use transport::{BestEffortTransport, SizedTransport, Transport, TransportProfile};
