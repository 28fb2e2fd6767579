//! Pluggable formatters that turn a [`LogEvent`] into message body bytes.
//!
//! The default [`TypedJsonFormatter`] writes one JSON object per event and
//! suffixes scalar property names with their type so the receiving side can
//! restore the original value types.

use std::io::{self, Write};
use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::event::{LogEvent, PropertyValue};

/// Errors raised while formatting an event.
#[derive(Debug)]
pub enum FormatError {
    /// Writing to the output failed
    Io(io::Error),

    /// JSON serialization failed
    Json(serde_json::Error),
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatError::Io(e) => write!(f, "Failed to write formatted event: {}", e),
            FormatError::Json(e) => write!(f, "Failed to serialize event: {}", e),
        }
    }
}

impl std::error::Error for FormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FormatError::Io(e) => Some(e),
            FormatError::Json(e) => Some(e),
        }
    }
}

impl From<io::Error> for FormatError {
    fn from(err: io::Error) -> Self {
        FormatError::Io(err)
    }
}

impl From<serde_json::Error> for FormatError {
    fn from(err: serde_json::Error) -> Self {
        FormatError::Json(err)
    }
}

/// Renders one log event to an output stream.
pub trait EventFormatter: Send + Sync {
    fn format(&self, event: &LogEvent, output: &mut dyn Write) -> Result<(), FormatError>;
}

/// JSON formatter with type-suffixed scalar property names.
///
/// ```text
/// {"Timestamp":"2024-05-01T12:00:00+00:00","Level":"info",
///  "MessageTemplate":"User {UserId} logged in","RenderedMessage":"User 42 logged in",
///  "Properties":{"UserId_i":42}}
/// ```
///
/// Suffixes: `_s` string, `_i` integer, `_d` float, `_b` boolean, `_t`
/// timestamp. Nulls, sequences and structures keep their plain name.
#[derive(Debug, Clone, Default)]
pub struct TypedJsonFormatter;

impl TypedJsonFormatter {
    fn suffixed_name(name: &str, value: &PropertyValue) -> String {
        let suffix = match value {
            PropertyValue::String(_) => "_s",
            PropertyValue::Integer(_) => "_i",
            PropertyValue::Float(_) => "_d",
            PropertyValue::Bool(_) => "_b",
            PropertyValue::Timestamp(_) => "_t",
            PropertyValue::Null | PropertyValue::Sequence(_) | PropertyValue::Structure(_) => "",
        };
        format!("{}{}", name, suffix)
    }
}

impl EventFormatter for TypedJsonFormatter {
    fn format(&self, event: &LogEvent, output: &mut dyn Write) -> Result<(), FormatError> {
        let mut properties = Map::new();
        for (name, value) in &event.properties {
            properties.insert(
                Self::suffixed_name(name, value),
                serde_json::to_value(value)?,
            );
        }

        let mut document = Map::new();
        document.insert(
            "Timestamp".to_string(),
            Value::String(event.timestamp.to_rfc3339()),
        );
        document.insert("Level".to_string(), Value::String(event.level.to_string()));
        document.insert(
            "MessageTemplate".to_string(),
            Value::String(event.message_template.clone()),
        );
        document.insert(
            "RenderedMessage".to_string(),
            Value::String(event.render_message()),
        );
        if !properties.is_empty() {
            document.insert("Properties".to_string(), Value::Object(properties));
        }

        serde_json::to_writer(&mut *output, &Value::Object(document))?;
        Ok(())
    }
}

/// Plain-text formatter: `<timestamp> [<level>] <rendered message>`.
#[derive(Debug, Clone, Default)]
pub struct TextFormatter;

impl EventFormatter for TextFormatter {
    fn format(&self, event: &LogEvent, output: &mut dyn Write) -> Result<(), FormatError> {
        write!(
            output,
            "{} [{}] {}",
            event.timestamp.to_rfc3339(),
            event.level,
            event.render_message()
        )?;
        Ok(())
    }
}

/// Built-in formatters selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatterKind {
    Json,
    Text,
}

impl FormatterKind {
    pub fn build(&self) -> Arc<dyn EventFormatter> {
        match self {
            FormatterKind::Json => Arc::new(TypedJsonFormatter),
            FormatterKind::Text => Arc::new(TextFormatter),
        }
    }
}

impl FromStr for FormatterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(FormatterKind::Json),
            "text" => Ok(FormatterKind::Text),
            other => Err(format!("unknown format '{}' (expected 'json' or 'text')", other)),
        }
    }
}
