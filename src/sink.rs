//! Direct (single-event) delivery with local error containment.
//!
//! Per message: `Encoded -> SizeChecked -> {Dropped | SendAttempted}`,
//! `SendAttempted -> {Delivered | RecoveryAttempted}`,
//! `RecoveryAttempted -> {Delivered | LoggedAndDiscarded}`.
//! Transport failures never leave this module.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::budget::SizeBudget;
use crate::client::TransportError;
use crate::encoder::{CompressionMode, CompressionPolicy, EncodeError, EventEncoder};
use crate::event::LogEvent;
use crate::self_log::SelfLog;
use crate::transport::Transport;

/// Terminal state of one single-event delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Sent on the first attempt
    Delivered,

    /// Sent by the recovery attempt
    DeliveredOnRecovery,

    /// Larger than a single message may be; never sent
    Dropped,

    /// Both attempts failed; reported to the self-log
    Discarded,
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered | Delivery::DeliveredOnRecovery)
    }
}

enum Attempt {
    Sent,
    Dropped,
    Failed(TransportError),
}

/// Encodes and delivers exactly one event per call.
pub struct DirectSink {
    encoder: Arc<EventEncoder>,
    transport: Arc<dyn Transport>,
    budget: SizeBudget,
    compression: CompressionMode,
    self_log: SelfLog,
}

impl DirectSink {
    pub fn new(
        encoder: Arc<EventEncoder>,
        transport: Arc<dyn Transport>,
        budget: SizeBudget,
        compression: CompressionPolicy,
        self_log: SelfLog,
    ) -> Self {
        let compression = compression.single_mode(transport.supports_compression_threshold());
        Self {
            encoder,
            transport,
            budget,
            compression,
            self_log,
        }
    }

    pub fn compression_mode(&self) -> CompressionMode {
        self.compression
    }

    /// Deliver one event.
    ///
    /// Only encoding failures of the first attempt are returned. Oversized
    /// messages are dropped and delivery failures get one recovery attempt;
    /// either way the outcome is reported through the returned [`Delivery`].
    pub async fn send_one(&self, event: &LogEvent) -> Result<Delivery, EncodeError> {
        match self.attempt(event).await? {
            Attempt::Sent => Ok(Delivery::Delivered),
            Attempt::Dropped => Ok(Delivery::Dropped),
            Attempt::Failed(error) => {
                warn!(error = %error, "Failed to send log event, attempting recovery");
                Ok(self.recover(event, error).await)
            }
        }
    }

    async fn recover(&self, event: &LogEvent, first: TransportError) -> Delivery {
        let failure = match self.attempt(event).await {
            Ok(Attempt::Sent) => {
                debug!("Log event delivered on recovery attempt");
                return Delivery::DeliveredOnRecovery;
            }
            Ok(Attempt::Dropped) => return Delivery::Dropped,
            Ok(Attempt::Failed(error)) => error.to_string(),
            Err(error) => error.to_string(),
        };

        self.self_log.write_line(format!(
            "Failed to emit log event after recovery attempt: {} (initial failure: {})",
            failure, first
        ));
        Delivery::Discarded
    }

    async fn attempt(&self, event: &LogEvent) -> Result<Attempt, EncodeError> {
        let message = self.encoder.encode(event, None, self.compression)?;

        if self.transport.supports_size_accounting() {
            let size = message.size_in_bytes();
            let allowed = self.budget.allowed_size(1);
            if size > allowed {
                self.self_log.write_line(format!(
                    "Dropping log event: encoded size {} bytes exceeds the {} byte single-message budget",
                    size, allowed
                ));
                return Ok(Attempt::Dropped);
            }
        }

        match self.transport.send_one(message).await {
            Ok(()) => Ok(Attempt::Sent),
            Err(error) => Ok(Attempt::Failed(error)),
        }
    }
}

impl std::fmt::Debug for DirectSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectSink")
            .field("budget", &self.budget)
            .field("compression", &self.compression)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LogLevel;
    use crate::transport::mock::{Call, MockTransport};
    use std::sync::Mutex;

    struct Harness {
        transport: Arc<MockTransport>,
        diagnostics: Arc<Mutex<Vec<String>>>,
        sink: DirectSink,
    }

    fn harness(sized: bool, budget: SizeBudget) -> Harness {
        let transport = Arc::new(MockTransport::new(sized));
        let diagnostics = Arc::new(Mutex::new(Vec::new()));
        let lines = diagnostics.clone();
        let self_log = SelfLog::with_listener(Arc::new(move |line: &str| {
            lines.lock().unwrap().push(line.to_string());
        }));

        let sink = DirectSink::new(
            Arc::new(EventEncoder::default()),
            transport.clone(),
            budget,
            CompressionPolicy::disabled(),
            self_log,
        );

        Harness {
            transport,
            diagnostics,
            sink,
        }
    }

    fn event_with_payload(len: usize) -> LogEvent {
        LogEvent::new(LogLevel::Info, "{Payload}").with_property("Payload", "x".repeat(len))
    }

    #[tokio::test]
    async fn test_delivers_on_first_attempt() {
        let h = harness(true, SizeBudget::default());
        let outcome = h.sink.send_one(&event_with_payload(10)).await.unwrap();

        assert_eq!(outcome, Delivery::Delivered);
        assert_eq!(h.transport.calls().len(), 1);
        assert!(h.diagnostics.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_message_is_dropped_with_one_diagnostic() {
        let h = harness(true, SizeBudget::new(2_000, 500));
        let outcome = h.sink.send_one(&event_with_payload(5_000)).await.unwrap();

        assert_eq!(outcome, Delivery::Dropped);
        assert!(h.transport.calls().is_empty());
        let diagnostics = h.diagnostics.lock().unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("1500 byte"));
    }

    #[tokio::test]
    async fn test_oversize_check_skipped_without_size_accounting() {
        let h = harness(false, SizeBudget::new(2_000, 500));
        let outcome = h.sink.send_one(&event_with_payload(5_000)).await.unwrap();

        assert_eq!(outcome, Delivery::Delivered);
        assert_eq!(h.transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_triggers_exactly_one_recovery() {
        let h = harness(true, SizeBudget::default());
        h.transport.script(&[true, false]);

        let outcome = h.sink.send_one(&event_with_payload(10)).await.unwrap();

        assert_eq!(outcome, Delivery::DeliveredOnRecovery);
        assert_eq!(h.transport.calls().len(), 2);
        assert_eq!(h.transport.delivered().len(), 1);
        assert!(h.diagnostics.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_recovery_is_contained_and_reported_once() {
        let h = harness(true, SizeBudget::default());
        h.transport.script(&[true, true, true]);

        let outcome = h.sink.send_one(&event_with_payload(10)).await.unwrap();

        assert_eq!(outcome, Delivery::Discarded);
        assert_eq!(h.transport.calls().len(), 2);
        assert!(matches!(h.transport.calls()[0], Call::One(_)));
        assert_eq!(h.diagnostics.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_each_send_uses_fresh_partition_key() {
        let h = harness(true, SizeBudget::default());
        h.transport.script(&[true]);

        h.sink.send_one(&event_with_payload(10)).await.unwrap();
        h.sink.send_one(&event_with_payload(10)).await.unwrap();

        let delivered = h.transport.delivered();
        assert_eq!(delivered.len(), 2);
        assert_ne!(delivered[0].partition_key(), delivered[1].partition_key());
    }

    #[test]
    fn test_compression_mode_follows_transport_capability() {
        let sized = Arc::new(MockTransport::new(true));
        let sink = DirectSink::new(
            Arc::new(EventEncoder::default()),
            sized,
            SizeBudget::default(),
            CompressionPolicy::new(true, 512),
            SelfLog::new(),
        );
        assert_eq!(sink.compression_mode(), CompressionMode::AboveThreshold(512));

        let best_effort = Arc::new(MockTransport::new(false));
        let sink = DirectSink::new(
            Arc::new(EventEncoder::default()),
            best_effort,
            SizeBudget::default(),
            CompressionPolicy::new(true, 512),
            SelfLog::new(),
        );
        assert_eq!(sink.compression_mode(), CompressionMode::Never);
    }

    #[test]
    fn test_delivery_is_delivered() {
        assert!(Delivery::Delivered.is_delivered());
        assert!(Delivery::DeliveredOnRecovery.is_delivered());
        assert!(!Delivery::Dropped.is_delivered());
        assert!(!Delivery::Discarded.is_delivered());
    }
}
