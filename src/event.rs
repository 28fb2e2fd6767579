//! Structured log events accepted by the forwarder.
//!
//! A [`LogEvent`] is produced by the logging front-end (or parsed from a JSON
//! line by the binary) and is only ever read by the encoder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Log severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Get all possible log levels.
    pub fn all() -> &'static [LogLevel] {
        &[
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
            LogLevel::Fatal,
        ]
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
            LogLevel::Fatal => write!(f, "fatal"),
        }
    }
}

/// A structured property value attached to a log event.
///
/// Deserialization is untagged: JSON `null`, booleans, integers and floats
/// map to their scalar variants, RFC 3339 strings become [`PropertyValue::Timestamp`],
/// arrays and objects become sequences and structures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    String(String),
    Sequence(Vec<PropertyValue>),
    Structure(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Whether this value is a scalar (everything except sequences and structures).
    pub fn is_scalar(&self) -> bool {
        !matches!(self, PropertyValue::Sequence(_) | PropertyValue::Structure(_))
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => write!(f, "null"),
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Integer(i) => write!(f, "{}", i),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            PropertyValue::String(s) => write!(f, "{}", s),
            PropertyValue::Sequence(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            PropertyValue::Structure(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", name, value)?;
                }
                write!(f, " }}")
            }
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Integer(value.into())
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(value: DateTime<Utc>) -> Self {
        PropertyValue::Timestamp(value)
    }
}

/// A single structured log event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// When the event was recorded
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Log severity level
    #[serde(default)]
    pub level: LogLevel,

    /// Message template with `{Name}` property holes
    #[serde(default)]
    pub message_template: String,

    /// Structured properties captured with the event
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl LogEvent {
    /// Create a new log event timestamped now.
    pub fn new(level: LogLevel, message_template: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message_template: message_template.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Attach a property to the event.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Override the event timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// True when the event carries neither a template nor properties.
    pub fn is_empty(&self) -> bool {
        self.message_template.is_empty() && self.properties.is_empty()
    }

    /// Render the message template, substituting `{Name}` holes with property values.
    ///
    /// `{@Name}` and `{$Name}` capture hints and `{Name:format}` specifiers are
    /// accepted and ignored. `{{` and `}}` render literal braces. Holes naming a
    /// missing property are left as written.
    pub fn render_message(&self) -> String {
        let template = &self.message_template;
        let mut out = String::with_capacity(template.len());
        let mut rest = template.as_str();

        while let Some(pos) = rest.find(|c: char| c == '{' || c == '}') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if tail.starts_with("{{") || tail.starts_with("}}") {
                out.push_str(&tail[..1]);
                rest = &tail[2..];
                continue;
            }

            if tail.starts_with('}') {
                out.push('}');
                rest = &tail[1..];
                continue;
            }

            match tail.find('}') {
                Some(end) => {
                    let hole = &tail[1..end];
                    let name = hole
                        .trim_start_matches(|c: char| c == '@' || c == '$')
                        .split(|c: char| c == ':' || c == ',')
                        .next()
                        .unwrap_or_default();

                    match self.properties.get(name) {
                        Some(value) => out.push_str(&value.to_string()),
                        None => out.push_str(&tail[..=end]),
                    }
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push_str(tail);
                    rest = "";
                }
            }
        }

        out.push_str(rest);
        out
    }
}
