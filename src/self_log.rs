//! Diagnostics channel for the forwarder's own failures.
//!
//! Every line is emitted as a `warn!` event on the `log_forwarder::self_log`
//! target and, when installed, handed to a listener. Writing never fails and
//! never blocks on I/O owned by the forwarder.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

/// Callback receiving each diagnostic line.
pub type SelfLogListener = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, Default)]
pub struct SelfLog {
    listener: Option<SelfLogListener>,
}

impl SelfLog {
    /// A channel that only emits through `tracing`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel that also forwards every line to `listener`.
    pub fn with_listener(listener: SelfLogListener) -> Self {
        Self {
            listener: Some(listener),
        }
    }

    pub fn write_line(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        warn!(target: "log_forwarder::self_log", "{}", message);
        if let Some(listener) = &self.listener {
            listener(message);
        }
    }
}

impl fmt::Debug for SelfLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfLog")
            .field("listener", &self.listener.is_some())
            .finish()
    }
}
