//! Payload size budget for a batch of messages.

use crate::message::{total_size, EncodedMessage};

/// Default transport message-size ceiling in bytes.
pub const DEFAULT_MESSAGE_LIMIT_BYTES: usize = 256_000;

/// Default per-message protocol overhead estimate in bytes.
///
/// An upper bound on envelope and framing cost, not a measured value.
pub const DEFAULT_MESSAGE_OVERHEAD_BYTES: usize = 6_000;

/// Computes how much payload a batch of N messages may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBudget {
    message_limit: usize,
    per_message_overhead: usize,
}

impl Default for SizeBudget {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_LIMIT_BYTES, DEFAULT_MESSAGE_OVERHEAD_BYTES)
    }
}

impl SizeBudget {
    pub fn new(message_limit: usize, per_message_overhead: usize) -> Self {
        Self {
            message_limit,
            per_message_overhead,
        }
    }

    pub fn message_limit(&self) -> usize {
        self.message_limit
    }

    pub fn per_message_overhead(&self) -> usize {
        self.per_message_overhead
    }

    /// `message_limit - per_message_overhead * batch_count`, floored at zero.
    ///
    /// A count of zero yields the ceiling unchanged.
    pub fn allowed_size(&self, batch_count: usize) -> usize {
        self.message_limit
            .saturating_sub(self.per_message_overhead.saturating_mul(batch_count))
    }

    /// Whether the combined size of `messages` fits the budget for their count.
    pub fn fits(&self, messages: &[EncodedMessage]) -> bool {
        total_size(messages) <= self.allowed_size(messages.len())
    }
}
