#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::RngCore;

use log_forwarder::self_log::SelfLogListener;
use log_forwarder::{
    EncodedMessage, EventFormatter, FormatError, LogEvent, LogLevel, SelfLog, Transport,
    TransportError,
};

/// A transport call as seen by the recording double.
#[derive(Debug, Clone)]
pub enum Sent {
    One(EncodedMessage),
    Batch(Vec<EncodedMessage>),
}

/// In-memory transport that records calls and fails on demand.
pub struct RecordingTransport {
    size_accounting: bool,
    sent: Mutex<Vec<Sent>>,
    failures: Mutex<VecDeque<bool>>,
    fail_always: bool,
}

impl RecordingTransport {
    pub fn sized() -> Self {
        Self::new(true, false)
    }

    pub fn best_effort() -> Self {
        Self::new(false, false)
    }

    /// A size-aware transport whose every send fails.
    pub fn broken() -> Self {
        Self::new(true, true)
    }

    fn new(size_accounting: bool, fail_always: bool) -> Self {
        Self {
            size_accounting,
            sent: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            fail_always,
        }
    }

    /// Queue outcomes for upcoming calls: `true` fails that call.
    pub fn fail_next(&self, outcomes: &[bool]) {
        self.failures.lock().unwrap().extend(outcomes.iter().copied());
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn batch_calls(&self) -> usize {
        self.sent()
            .iter()
            .filter(|s| matches!(s, Sent::Batch(_)))
            .count()
    }

    pub fn single_calls(&self) -> usize {
        self.sent()
            .iter()
            .filter(|s| matches!(s, Sent::One(_)))
            .count()
    }

    fn outcome(&self) -> Result<(), TransportError> {
        let fail = self.fail_always || self.failures.lock().unwrap().pop_front().unwrap_or(false);
        if fail {
            Err(TransportError::Timeout)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn supports_size_accounting(&self) -> bool {
        self.size_accounting
    }

    async fn send_one(&self, message: EncodedMessage) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Sent::One(message));
        self.outcome()
    }

    async fn send_batch(&self, messages: Vec<EncodedMessage>) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Sent::Batch(messages));
        self.outcome()
    }
}

/// Formatter writing exactly `len` bytes per event.
pub struct FixedSizeFormatter(pub usize);

impl EventFormatter for FixedSizeFormatter {
    fn format(&self, _event: &LogEvent, output: &mut dyn Write) -> Result<(), FormatError> {
        output.write_all(&vec![b'x'; self.0])?;
        Ok(())
    }
}

/// Formatter writing `len` random (incompressible) bytes per event.
pub struct RandomBytesFormatter(pub usize);

impl EventFormatter for RandomBytesFormatter {
    fn format(&self, _event: &LogEvent, output: &mut dyn Write) -> Result<(), FormatError> {
        let mut bytes = vec![0u8; self.0];
        rand::thread_rng().fill_bytes(&mut bytes);
        output.write_all(&bytes)?;
        Ok(())
    }
}

/// Self-log listener whose lines are captured for assertions.
pub fn capturing_listener() -> (SelfLogListener, Arc<Mutex<Vec<String>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    let listener: SelfLogListener = Arc::new(move |line: &str| {
        sink.lock().unwrap().push(line.to_string());
    });
    (listener, lines)
}

/// Self-log whose lines are captured for assertions.
pub fn capturing_self_log() -> (SelfLog, Arc<Mutex<Vec<String>>>) {
    let (listener, lines) = capturing_listener();
    (SelfLog::with_listener(listener), lines)
}

pub fn events(n: usize) -> Vec<LogEvent> {
    (0..n)
        .map(|i| {
            LogEvent::new(LogLevel::Info, "Request {RequestId} served")
                .with_property("RequestId", i as i64)
        })
        .collect()
}
