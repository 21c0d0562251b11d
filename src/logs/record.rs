//! Structured server log record.
//!
//! The servers write one JSON document per line:
//! ```text
//! {"t":{"$date":"2024-05-01T10:00:00.000+00:00"},"s":"W","c":"NETWORK","id":23019,
//!  "ctx":"listener","msg":"Error accepting new connection","attr":{"error":"..."}}
//! ```
//! The timestamp is dropped; `tracing` stamps its own.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::Level;

/// Server log severity (`s` field).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Severity {
    /// `F`
    Fatal,
    /// `E`
    Error,
    /// `W`
    Warning,
    /// `I`
    Info,
    /// `D1`..`D5`
    Debug(u8),
    /// Anything else, including a missing field.
    #[default]
    Unknown,
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        match s.as_str() {
            "F" => Severity::Fatal,
            "E" => Severity::Error,
            "W" => Severity::Warning,
            "I" => Severity::Info,
            other => match other.strip_prefix('D').and_then(|n| n.parse::<u8>().ok()) {
                Some(n) => Severity::Debug(n),
                None => Severity::Unknown,
            },
        }
    }
}

impl Severity {
    /// Level the record is re-emitted at.
    ///
    /// Only warnings and errors pass a default `info` filter. Fatal maps to
    /// ERROR: the server may be dying, but this process must not.
    pub fn level(&self) -> Level {
        match self {
            Severity::Fatal | Severity::Error => Level::ERROR,
            Severity::Warning => Level::WARN,
            Severity::Info | Severity::Unknown => Level::DEBUG,
            Severity::Debug(_) => Level::TRACE,
        }
    }
}

/// One decoded server log line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogRecord {
    /// Severity.
    #[serde(rename = "s", default)]
    pub severity: Severity,
    /// Subsystem tag (`NETWORK`, `REPL`, ...).
    #[serde(rename = "c", default)]
    pub component: String,
    /// Numeric message id.
    #[serde(default)]
    pub id: i64,
    /// Context tag (thread / connection name).
    #[serde(rename = "ctx", default)]
    pub context: String,
    /// Message text.
    #[serde(rename = "msg", default)]
    pub message: String,
    /// Structured attributes.
    #[serde(rename = "attr", default)]
    pub attributes: Option<Map<String, Value>>,
}

macro_rules! emit_at {
    ($level:expr, $rec:ident, $attr:ident) => {
        tracing::event!(
            $level,
            c = %$rec.component,
            id = $rec.id,
            ctx = %$rec.context,
            attr = $attr,
            "{}",
            $rec.message
        )
    };
}

impl LogRecord {
    /// Parses one line.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Attributes rendered as JSON, `None` when absent or empty.
    pub fn attributes_json(&self) -> Option<String> {
        self.attributes
            .as_ref()
            .filter(|m| !m.is_empty())
            .map(|m| Value::Object(m.clone()).to_string())
    }

    /// Re-emits the record into the current `tracing` span.
    pub fn emit(&self) {
        let rec = self;
        let attr = self.attributes_json();
        let attr = attr.as_deref();
        // Keep in sync with `Severity::level`.
        match self.severity {
            Severity::Fatal | Severity::Error => emit_at!(Level::ERROR, rec, attr),
            Severity::Warning => emit_at!(Level::WARN, rec, attr),
            Severity::Info | Severity::Unknown => emit_at!(Level::DEBUG, rec, attr),
            Severity::Debug(_) => emit_at!(Level::TRACE, rec, attr),
        }
    }
}
