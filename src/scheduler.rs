//! Periodic batching loop that feeds the dispatcher.
//!
//! Events arrive over a tokio mpsc channel. A batch is dispatched when the
//! batch size is reached or the flush interval elapses, whichever comes
//! first. One dispatch runs at a time; the loop awaits it before receiving
//! more events. Buffered events are not persisted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::dispatcher::{BatchDispatcher, DispatchOutcome};
use crate::event::LogEvent;

/// Statistics about the batching loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Total number of events received
    pub events_received: u64,

    /// Number of dispatch calls made
    pub batches_dispatched: u64,

    /// Dispatches triggered by the batch size threshold
    pub size_flushes: u64,

    /// Dispatches triggered by the flush interval
    pub time_flushes: u64,

    /// Batches that degraded to single-event delivery
    pub degraded_batches: u64,

    /// Dispatches that failed to encode
    pub encode_failures: u64,

    /// Events never sent because their dispatch failed to encode
    pub events_unsent: u64,
}

/// Run the batching loop until `rx` closes, then flush what is left.
///
/// # Arguments
///
/// * `rx` - Receiver for incoming log events
/// * `batch_size` - Number of events to accumulate before dispatching
/// * `flush_interval` - Duration to wait before dispatching even if batch size not reached
/// * `dispatcher` - Dispatcher that delivers each batch
pub async fn run_batching(
    mut rx: mpsc::Receiver<LogEvent>,
    batch_size: usize,
    flush_interval: Duration,
    dispatcher: Arc<BatchDispatcher>,
) -> SchedulerStats {
    let batch_size = batch_size.max(1);
    let mut buffer: Vec<LogEvent> = Vec::with_capacity(batch_size);
    let mut ticker = interval(flush_interval);
    let mut stats = SchedulerStats::default();

    // Skip the first immediate tick
    ticker.tick().await;

    loop {
        tokio::select! {
            maybe_event = rx.recv() => {
                match maybe_event {
                    Some(event) => {
                        stats.events_received += 1;
                        buffer.push(event);

                        if buffer.len() >= batch_size {
                            debug!(batch_size = buffer.len(), "Size-based flush triggered");
                            stats.size_flushes += 1;
                            flush(&mut buffer, &dispatcher, &mut stats).await;
                        }
                    }
                    None => {
                        if !buffer.is_empty() {
                            info!(remaining = buffer.len(), "Channel closed, flushing remaining events");
                            flush(&mut buffer, &dispatcher, &mut stats).await;
                        }
                        return stats;
                    }
                }
            }

            _ = ticker.tick() => {
                if !buffer.is_empty() {
                    debug!(batch_size = buffer.len(), "Time-based flush triggered");
                    stats.time_flushes += 1;
                    flush(&mut buffer, &dispatcher, &mut stats).await;
                }
            }
        }
    }
}

async fn flush(buffer: &mut Vec<LogEvent>, dispatcher: &BatchDispatcher, stats: &mut SchedulerStats) {
    let batch = std::mem::replace(buffer, Vec::with_capacity(buffer.capacity()));
    stats.batches_dispatched += 1;

    match dispatcher.dispatch(&batch).await {
        Ok(DispatchOutcome::Degraded { reason, summary }) => {
            stats.degraded_batches += 1;
            info!(
                reason = ?reason,
                delivered = summary.delivered,
                dropped = summary.dropped,
                discarded = summary.discarded,
                "Batch delivered event by event"
            );
        }
        Ok(_) => {}
        Err(e) => {
            stats.encode_failures += 1;
            stats.events_unsent += e.unsent(batch.len()) as u64;
            error!(
                error = %e.error,
                delivered = e.handled.delivered,
                unsent = e.unsent(batch.len()),
                "Failed to encode event, rest of batch not sent"
            );
        }
    }
}
