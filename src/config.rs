//! Configuration module for the log forwarder.
//!
//! This module provides environment-based configuration: endpoint URL,
//! application tag, batching limits, payload size budget, compression and
//! transport profile.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::budget::{DEFAULT_MESSAGE_LIMIT_BYTES, DEFAULT_MESSAGE_OVERHEAD_BYTES};
use crate::formatter::FormatterKind;
use crate::transport::TransportProfile;

/// Default base URL of the event ingestion endpoint
const DEFAULT_ENDPOINT_URL: &str = "http://localhost:8080";

/// Path of the event ingestion API below the base URL
const EVENTS_PATH: &str = "/api/v1/events";

/// Default batch size (number of events per dispatch)
///
/// With the default budget a full batch still leaves 106,000 bytes of payload.
const DEFAULT_BATCH_SIZE: usize = 25;

/// Largest batch the forwarder will collect
const MAX_BATCH_SIZE: usize = 100;

/// Default flush interval in seconds
const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 2;

/// Minimum flush interval to prevent overwhelming the endpoint
const MIN_FLUSH_INTERVAL_SECS: u64 = 1;

/// Maximum flush interval to ensure reasonable data freshness
const MAX_FLUSH_INTERVAL_SECS: u64 = 300;

/// Default HTTP request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default body size above which single-event sends are compressed
const DEFAULT_COMPRESSION_THRESHOLD_BYTES: usize = 1024;

/// Configuration for the log forwarder.
///
/// All settings can be configured via environment variables:
/// - `LOG_FORWARDER_ENDPOINT_URL`: ingestion base URL (default: http://localhost:8080)
/// - `LOG_FORWARDER_APPLICATION_NAME`: value of the `Type` tag (default: unset)
/// - `LOG_FORWARDER_BATCH_SIZE`: events per batch, 1-100 (default: 25)
/// - `LOG_FORWARDER_FLUSH_INTERVAL_SECS`: seconds between flushes (default: 2)
/// - `LOG_FORWARDER_REQUEST_TIMEOUT_SECS`: HTTP request timeout (default: 30)
/// - `LOG_FORWARDER_MAX_MESSAGE_BYTES`: transport message ceiling (default: 256000)
/// - `LOG_FORWARDER_MESSAGE_OVERHEAD_BYTES`: per-message overhead estimate (default: 6000)
/// - `LOG_FORWARDER_COMPRESSION`: compress message bodies (default: true)
/// - `LOG_FORWARDER_COMPRESSION_THRESHOLD_BYTES`: single-send compression threshold (default: 1024)
/// - `LOG_FORWARDER_TRANSPORT_PROFILE`: `sized` or `best-effort` (default: sized)
/// - `LOG_FORWARDER_FORMAT`: `json` or `text` (default: json)
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the ingestion endpoint
    pub endpoint_url: String,

    /// Full URL events are posted to
    pub events_url: String,

    /// Value of the application-name tag
    pub application_name: Option<String>,

    /// Number of events to accumulate before dispatching a batch
    pub batch_size: usize,

    /// Duration to wait before flushing buffered events, even if batch size not reached
    pub flush_interval: Duration,

    /// HTTP request timeout duration
    pub request_timeout: Duration,

    /// Transport message-size ceiling in bytes
    pub max_message_bytes: usize,

    /// Fixed per-message protocol overhead estimate in bytes
    pub message_overhead_bytes: usize,

    /// Whether message bodies are compressed
    pub compression: bool,

    /// Body size above which single-event sends are compressed
    pub compression_threshold: usize,

    /// Which transport implementation to use
    pub transport_profile: TransportProfile,

    /// Which formatter renders event bodies
    pub format: FormatterKind,
}

/// Error type for configuration loading failures
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub env_var: Option<String>,
}

impl ConfigError {
    fn for_var(env_var: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            env_var: Some(env_var.to_string()),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.env_var {
            Some(var) => write!(f, "Configuration error for {}: {}", var, self.message),
            None => write!(f, "Configuration error: {}", self.message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable does not parse, falls outside its
    /// bounds, or if the overhead of a full batch reaches the message
    /// ceiling.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use log_forwarder::config::Config;
    ///
    /// let config = Config::from_env().expect("Failed to load config");
    /// println!("Events URL: {}", config.events_url);
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint_url = env::var("LOG_FORWARDER_ENDPOINT_URL")
            .unwrap_or_else(|_| DEFAULT_ENDPOINT_URL.to_string());
        let endpoint_url = endpoint_url.trim_end_matches('/').to_string();
        let events_url = format!("{}{}", endpoint_url, EVENTS_PATH);

        let application_name = env::var("LOG_FORWARDER_APPLICATION_NAME")
            .ok()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let batch_size = Self::parse_bounded(
            "LOG_FORWARDER_BATCH_SIZE",
            DEFAULT_BATCH_SIZE,
            1,
            MAX_BATCH_SIZE,
        )?;

        let flush_interval = Duration::from_secs(Self::parse_bounded(
            "LOG_FORWARDER_FLUSH_INTERVAL_SECS",
            DEFAULT_FLUSH_INTERVAL_SECS,
            MIN_FLUSH_INTERVAL_SECS,
            MAX_FLUSH_INTERVAL_SECS,
        )?);

        let request_timeout = Duration::from_secs(Self::parse_bounded(
            "LOG_FORWARDER_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
            1,
            u64::MAX,
        )?);

        let max_message_bytes = Self::parse_bounded(
            "LOG_FORWARDER_MAX_MESSAGE_BYTES",
            DEFAULT_MESSAGE_LIMIT_BYTES,
            1,
            usize::MAX,
        )?;

        let message_overhead_bytes = Self::parse_var(
            "LOG_FORWARDER_MESSAGE_OVERHEAD_BYTES",
            DEFAULT_MESSAGE_OVERHEAD_BYTES,
        )?;

        if message_overhead_bytes.saturating_mul(batch_size) >= max_message_bytes {
            return Err(ConfigError::for_var(
                "LOG_FORWARDER_MESSAGE_OVERHEAD_BYTES",
                format!(
                    "overhead {} x batch size {} leaves no room for a full batch within {} bytes",
                    message_overhead_bytes, batch_size, max_message_bytes
                ),
            ));
        }

        let compression = Self::parse_var("LOG_FORWARDER_COMPRESSION", true)?;

        let compression_threshold = Self::parse_var(
            "LOG_FORWARDER_COMPRESSION_THRESHOLD_BYTES",
            DEFAULT_COMPRESSION_THRESHOLD_BYTES,
        )?;

        let transport_profile =
            Self::parse_var("LOG_FORWARDER_TRANSPORT_PROFILE", TransportProfile::Sized)?;

        let format = Self::parse_var("LOG_FORWARDER_FORMAT", FormatterKind::Json)?;

        Ok(Self {
            endpoint_url,
            events_url,
            application_name,
            batch_size,
            flush_interval,
            request_timeout,
            max_message_bytes,
            message_overhead_bytes,
            compression,
            compression_threshold,
            transport_profile,
            format,
        })
    }

    /// Parse an environment variable, falling back to `default` when unset.
    fn parse_var<T>(env_var: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(env_var) {
            Ok(value) => value.trim().parse().map_err(|e: T::Err| {
                ConfigError::for_var(env_var, format!("'{}' is not valid: {}", value, e))
            }),
            Err(_) => Ok(default),
        }
    }

    /// Parse a numeric environment variable and check it lies within `min..=max`.
    fn parse_bounded<T>(env_var: &str, default: T, min: T, max: T) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + std::fmt::Display + Copy,
    {
        match env::var(env_var) {
            Ok(value) => {
                let parsed: T = value.trim().parse().map_err(|_| {
                    ConfigError::for_var(env_var, format!("'{}' is not a valid number", value))
                })?;

                if parsed < min {
                    return Err(ConfigError::for_var(
                        env_var,
                        format!("{} is below minimum ({})", parsed, min),
                    ));
                }

                if parsed > max {
                    return Err(ConfigError::for_var(
                        env_var,
                        format!("{} exceeds maximum ({})", parsed, max),
                    ));
                }

                Ok(parsed)
            }
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    /// Create a default configuration using default values.
    ///
    /// This is useful for testing or when environment variables are not set.
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            events_url: format!("{}{}", DEFAULT_ENDPOINT_URL, EVENTS_PATH),
            application_name: None,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: Duration::from_secs(DEFAULT_FLUSH_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_message_bytes: DEFAULT_MESSAGE_LIMIT_BYTES,
            message_overhead_bytes: DEFAULT_MESSAGE_OVERHEAD_BYTES,
            compression: true,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD_BYTES,
            transport_profile: TransportProfile::Sized,
            format: FormatterKind::Json,
        }
    }
}
