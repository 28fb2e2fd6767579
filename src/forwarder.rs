//! Assembles a [`BatchDispatcher`] from configuration.

use std::sync::Arc;

use tracing::info;

use crate::budget::SizeBudget;
use crate::client::{IngestClient, TransportError};
use crate::config::Config;
use crate::dispatcher::BatchDispatcher;
use crate::encoder::{CompressionPolicy, EventEncoder, TaggingHook};
use crate::formatter::EventFormatter;
use crate::self_log::{SelfLog, SelfLogListener};
use crate::transport::{self, Transport};

/// Settings that only exist programmatically.
#[derive(Default, Clone)]
pub struct ForwarderOptions {
    /// Replaces the formatter selected by `Config::format`
    pub formatter: Option<Arc<dyn EventFormatter>>,

    /// Runs on every encoded message after default tagging
    pub tagging_hook: Option<TaggingHook>,

    /// Receives every self-log diagnostic
    pub self_log_listener: Option<SelfLogListener>,
}

impl ForwarderOptions {
    pub fn with_formatter(mut self, formatter: Arc<dyn EventFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn with_tagging_hook(mut self, hook: TaggingHook) -> Self {
        self.tagging_hook = Some(hook);
        self
    }

    pub fn with_self_log_listener(mut self, listener: SelfLogListener) -> Self {
        self.self_log_listener = Some(listener);
        self
    }
}

/// Build a dispatcher that posts through the configured transport profile.
///
/// # Errors
///
/// Returns `TransportError::Config` if the HTTP client cannot be built.
pub fn build(config: &Config, options: ForwarderOptions) -> Result<BatchDispatcher, TransportError> {
    let client = IngestClient::new(config)?;
    let transport = transport::for_profile(config.transport_profile, client, config.max_message_bytes);

    info!(
        events_url = %config.events_url,
        transport_profile = %config.transport_profile,
        size_accounting = transport.supports_size_accounting(),
        "Transport initialized"
    );

    Ok(build_with_transport(config, options, transport))
}

/// Build a dispatcher over an already constructed transport.
pub fn build_with_transport(
    config: &Config,
    options: ForwarderOptions,
    transport: Arc<dyn Transport>,
) -> BatchDispatcher {
    let formatter = options.formatter.unwrap_or_else(|| config.format.build());

    let encoder = EventEncoder::new(formatter)
        .with_application_name(config.application_name.clone())
        .with_hook(options.tagging_hook);

    let self_log = match options.self_log_listener {
        Some(listener) => SelfLog::with_listener(listener),
        None => SelfLog::new(),
    };

    BatchDispatcher::new(
        Arc::new(encoder),
        transport,
        SizeBudget::new(config.max_message_bytes, config.message_overhead_bytes),
        CompressionPolicy::new(config.compression, config.compression_threshold),
        self_log,
    )
}
