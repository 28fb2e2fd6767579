//! Batch dispatch with size-budget enforcement and per-event fallback.
//!
//! A batch goes out as one transport operation when it fits the budget for
//! its size. Otherwise, or when the batch send itself fails, every original
//! event is re-encoded and delivered through the [`DirectSink`].

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::budget::SizeBudget;
use crate::encoder::{CompressionMode, CompressionPolicy, EncodeError, EventEncoder};
use crate::event::LogEvent;
use crate::message::{total_size, EncodedMessage};
use crate::self_log::SelfLog;
use crate::sink::{Delivery, DirectSink};
use crate::transport::Transport;

/// Why a batch was delivered one event at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradeReason {
    /// The encoded batch exceeded the size budget
    OverBudget { size: usize, allowed: usize },

    /// The single batch send failed
    BatchSendFailed,
}

/// Per-event tallies of a degraded dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FallbackSummary {
    pub delivered: usize,
    pub dropped: usize,
    pub discarded: usize,
}

impl FallbackSummary {
    fn record(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Delivered | Delivery::DeliveredOnRecovery => self.delivered += 1,
            Delivery::Dropped => self.dropped += 1,
            Delivery::Discarded => self.discarded += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.delivered + self.dropped + self.discarded
    }
}

/// Outcome of one dispatch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing to send
    Empty,

    /// Sent as a single transport operation
    Batched { events: usize, size: usize },

    /// Delivered event by event
    Degraded {
        reason: DegradeReason,
        summary: FallbackSummary,
    },
}

/// An encoding failure that stopped a dispatch.
///
/// `handled` tallies the events that had already reached a terminal state on
/// the per-event path when encoding failed. It is empty when the batch
/// failed to encode before anything was sent.
#[derive(Debug)]
pub struct DispatchError {
    pub error: EncodeError,
    pub handled: FallbackSummary,
}

impl DispatchError {
    /// Events of a `batch_len` batch that were never sent.
    pub fn unsent(&self, batch_len: usize) -> usize {
        batch_len.saturating_sub(self.handled.total())
    }
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} events already handled)",
            self.error,
            self.handled.total()
        )
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<EncodeError> for DispatchError {
    fn from(error: EncodeError) -> Self {
        Self {
            error,
            handled: FallbackSummary::default(),
        }
    }
}

/// Sends scheduler-provided batches of log events.
pub struct BatchDispatcher {
    encoder: Arc<EventEncoder>,
    transport: Arc<dyn Transport>,
    budget: SizeBudget,
    compression: CompressionMode,
    direct: DirectSink,
}

impl BatchDispatcher {
    pub fn new(
        encoder: Arc<EventEncoder>,
        transport: Arc<dyn Transport>,
        budget: SizeBudget,
        compression: CompressionPolicy,
        self_log: SelfLog,
    ) -> Self {
        let direct = DirectSink::new(
            encoder.clone(),
            transport.clone(),
            budget,
            compression,
            self_log,
        );

        Self {
            encoder,
            transport,
            budget,
            compression: compression.batch_mode(),
            direct,
        }
    }

    pub fn budget(&self) -> SizeBudget {
        self.budget
    }

    /// The single-event sink used for fallback delivery.
    pub fn direct_sink(&self) -> &DirectSink {
        &self.direct
    }

    /// Dispatch one batch.
    ///
    /// Encoding failures are returned; delivery failures are contained.
    pub async fn dispatch(&self, events: &[LogEvent]) -> Result<DispatchOutcome, DispatchError> {
        if events.is_empty() {
            return Ok(DispatchOutcome::Empty);
        }

        let partition_key = Uuid::new_v4().to_string();
        let messages = events
            .iter()
            .map(|event| self.encoder.encode(event, Some(partition_key.as_str()), self.compression))
            .collect::<Result<Vec<EncodedMessage>, _>>()?;

        let size = total_size(&messages);

        if self.transport.supports_size_accounting() {
            let allowed = self.budget.allowed_size(messages.len());
            if size > allowed {
                info!(
                    events = events.len(),
                    size_bytes = size,
                    allowed_bytes = allowed,
                    "Batch exceeds size budget, sending events individually"
                );
                drop(messages);
                let summary = self.send_individually(events).await?;
                return Ok(DispatchOutcome::Degraded {
                    reason: DegradeReason::OverBudget { size, allowed },
                    summary,
                });
            }
        }

        match self.transport.send_batch(messages).await {
            Ok(()) => {
                debug!(
                    events = events.len(),
                    size_bytes = size,
                    partition_key = %partition_key,
                    "Batch delivered"
                );
                Ok(DispatchOutcome::Batched {
                    events: events.len(),
                    size,
                })
            }
            Err(error) => {
                warn!(
                    error = %error,
                    events = events.len(),
                    "Batch send failed, sending events individually"
                );
                let summary = self.send_individually(events).await?;
                Ok(DispatchOutcome::Degraded {
                    reason: DegradeReason::BatchSendFailed,
                    summary,
                })
            }
        }
    }

    async fn send_individually(
        &self,
        events: &[LogEvent],
    ) -> Result<FallbackSummary, DispatchError> {
        let mut summary = FallbackSummary::default();
        for event in events {
            match self.direct.send_one(event).await {
                Ok(delivery) => summary.record(delivery),
                Err(error) => {
                    return Err(DispatchError {
                        error,
                        handled: summary,
                    })
                }
            }
        }
        Ok(summary)
    }
}

impl std::fmt::Debug for BatchDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchDispatcher")
            .field("encoder", &self.encoder)
            .field("budget", &self.budget)
            .field("compression", &self.compression)
            .field("direct", &self.direct)
            .finish()
    }
}
