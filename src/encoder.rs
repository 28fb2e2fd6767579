//! Turns one [`LogEvent`] into one [`EncodedMessage`].
//!
//! Encoding runs in a fixed order: format, compress, assign the partition key,
//! add the application-name tag, then invoke the tagging hook. The hook sees
//! the defaults and has the last word.

use std::io::Write;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::event::LogEvent;
use crate::formatter::{EventFormatter, FormatError, TypedJsonFormatter};
use crate::message::{ContentEncoding, EncodedMessage, APPLICATION_TAG};

/// Default zstd compression level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Caller-supplied hook run after default tagging.
pub type TaggingHook = Arc<dyn Fn(&mut EncodedMessage, &LogEvent) + Send + Sync>;

/// Errors raised while encoding an event.
#[derive(Debug)]
pub enum EncodeError {
    /// The formatter failed
    Format(FormatError),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::Format(e) => write!(f, "Failed to encode log event: {}", e),
        }
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EncodeError::Format(e) => Some(e),
        }
    }
}

impl From<FormatError> for EncodeError {
    fn from(err: FormatError) -> Self {
        EncodeError::Format(err)
    }
}

/// When the encoder compresses a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    /// Leave the body as formatted
    Never,

    /// Always compress
    Always,

    /// Compress only bodies strictly larger than the given byte count
    AboveThreshold(usize),
}

/// Compression settings shared by the batched and direct paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionPolicy {
    /// Whether compression is enabled at all
    pub enabled: bool,

    /// Body size above which the direct path compresses
    pub threshold: usize,
}

impl CompressionPolicy {
    pub fn new(enabled: bool, threshold: usize) -> Self {
        Self { enabled, threshold }
    }

    pub fn disabled() -> Self {
        Self::new(false, 0)
    }

    /// Mode for the batched path: unconditional when enabled.
    pub fn batch_mode(&self) -> CompressionMode {
        if self.enabled {
            CompressionMode::Always
        } else {
            CompressionMode::Never
        }
    }

    /// Mode for the direct path: threshold-gated, and only on transports
    /// that support the threshold.
    pub fn single_mode(&self, threshold_supported: bool) -> CompressionMode {
        if self.enabled && threshold_supported {
            CompressionMode::AboveThreshold(self.threshold)
        } else {
            CompressionMode::Never
        }
    }
}

/// Encodes log events into wire messages.
pub struct EventEncoder {
    formatter: Arc<dyn EventFormatter>,
    application_name: Option<String>,
    compression_level: i32,
    hook: Option<TaggingHook>,
}

impl Default for EventEncoder {
    fn default() -> Self {
        Self::new(Arc::new(TypedJsonFormatter))
    }
}

impl EventEncoder {
    pub fn new(formatter: Arc<dyn EventFormatter>) -> Self {
        Self {
            formatter,
            application_name: None,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            hook: None,
        }
    }

    /// Tag every message with `Type = name`. Empty names are ignored.
    pub fn with_application_name(mut self, name: Option<String>) -> Self {
        self.application_name = name.filter(|n| !n.is_empty());
        self
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn with_hook(mut self, hook: Option<TaggingHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn application_name(&self) -> Option<&str> {
        self.application_name.as_deref()
    }

    /// Encode one event.
    ///
    /// Without a `partition_key` a fresh UUID is used. Formatter failures are
    /// returned to the caller; an event that formats to nothing yields an
    /// empty body.
    pub fn encode(
        &self,
        event: &LogEvent,
        partition_key: Option<&str>,
        mode: CompressionMode,
    ) -> Result<EncodedMessage, EncodeError> {
        let mut formatted = Vec::new();
        self.formatter.format(event, &mut formatted)?;

        let (body, content_encoding) = self.compress(formatted, mode);

        let partition_key = match partition_key {
            Some(key) => key.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        let mut message = EncodedMessage::new(body, content_encoding, partition_key);

        if let Some(name) = &self.application_name {
            message
                .tags_mut()
                .entry(APPLICATION_TAG.to_string())
                .or_insert_with(|| name.clone());
        }

        if let Some(hook) = &self.hook {
            hook(&mut message, event);
        }

        Ok(message)
    }

    fn compress(&self, data: Vec<u8>, mode: CompressionMode) -> (Vec<u8>, Option<ContentEncoding>) {
        let wanted = match mode {
            CompressionMode::Never => false,
            CompressionMode::Always => true,
            CompressionMode::AboveThreshold(threshold) => data.len() > threshold,
        };
        if !wanted || data.is_empty() {
            return (data, None);
        }

        match self.zstd(&data) {
            Ok(compressed) => (compressed, Some(ContentEncoding::Zstd)),
            Err(e) => {
                debug!(error = %e, "Failed to compress message body, sending uncompressed");
                (data, None)
            }
        }
    }

    fn zstd(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = zstd::stream::write::Encoder::new(Vec::new(), self.compression_level)?;
        encoder.write_all(data)?;
        encoder.finish()
    }
}

impl std::fmt::Debug for EventEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEncoder")
            .field("application_name", &self.application_name)
            .field("compression_level", &self.compression_level)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
