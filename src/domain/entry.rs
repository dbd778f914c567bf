//! Log entries as supplied by callers, and the enriched [`Event`] that is dispatched.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use strum_macros::{Display, EnumString};

/// The severity of a [`LogEntry`]. Ordered from least to most severe.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Severity {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

/// The place in the source code a log line is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Base name of the source file.
    pub file: String,
    pub line: u32,
    /// Fully qualified function or module path. Empty when unknown.
    pub function: String,
}

impl SourceLocation {
    pub(crate) const UNKNOWN_FILE: &'static str = "???";

    pub fn new(file: &str, line: u32, function: &str) -> Self {
        SourceLocation {
            file: base_name(file).to_string(),
            line,
            function: function.to_string(),
        }
    }

    /// Used when the call stack cannot be inspected.
    pub fn unknown() -> Self {
        SourceLocation {
            file: Self::UNKNOWN_FILE.to_string(),
            line: 0,
            function: String::new(),
        }
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// A single log event as handed to [`Logger::log`](crate::Logger::log).
#[derive(Debug, Clone, Default)]
pub struct LogEntry {
    pub message: String,
    pub severity: Severity,
    /// Merged over the common labels when sent to Cloud Logging. These win on collisions.
    pub labels: HashMap<String, String>,
    /// Replaces the default payload sent to Cloud Logging.
    pub structured_payload: Option<Value>,
    /// Extra frames to skip above the immediate caller of the logging entry point. `None`
    /// attributes the entry to the immediate caller.
    pub call_depth: Option<usize>,
    /// A call site captured by the caller, e.g. by the logging macros. Takes precedence over
    /// `call_depth`.
    pub source: Option<SourceLocation>,
}

impl LogEntry {
    pub fn new<S: Into<String>>(severity: Severity, message: S) -> Self {
        LogEntry {
            message: message.into(),
            severity,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_label<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_labels(mut self, labels: HashMap<String, String>) -> Self {
        self.labels.extend(labels);
        self
    }

    #[must_use]
    pub fn with_structured_payload(self, payload: Value) -> Self {
        Self {
            structured_payload: Some(payload),
            ..self
        }
    }

    #[must_use]
    pub fn with_call_depth(self, depth: usize) -> Self {
        Self {
            call_depth: Some(depth),
            ..self
        }
    }

    #[must_use]
    pub fn with_source(self, source: SourceLocation) -> Self {
        Self {
            source: Some(source),
            ..self
        }
    }
}

/// A [`LogEntry`] stamped with its local timestamp and call site. Exists only while it is
/// being dispatched.
///
/// Serializes to the default Cloud Logging payload: `{"message": .., "localTimestamp": ..}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub message: String,
    pub local_timestamp: String,
    #[serde(skip)]
    pub severity: Severity,
    #[serde(skip)]
    pub labels: HashMap<String, String>,
    #[serde(skip)]
    pub structured_payload: Option<Value>,
    #[serde(skip)]
    pub source: SourceLocation,
}

impl Event {
    pub(crate) fn new(entry: LogEntry, local_timestamp: String, source: SourceLocation) -> Self {
        Event {
            message: entry.message,
            local_timestamp,
            severity: entry.severity,
            labels: entry.labels,
            structured_payload: entry.structured_payload,
            source,
        }
    }

    /// The line written to byte-stream writers and the serial port: trimmed, newline
    /// terminated.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut line = self.to_string().trim().to_string();
        line.push('\n');
        line.into_bytes()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            // 2024-01-02T15:04:05.123456+01:00 ERROR main.rs:82: This is a log message.
            Severity::Error | Severity::Critical => write!(
                f,
                "{} {} {}:{}: {}",
                self.local_timestamp, self.severity, self.source.file, self.source.line, self.message
            ),
            // 2024-01-02T15:04:05.123456+01:00 INFO: This is a log message.
            _ => write!(
                f,
                "{} {}: {}",
                self.local_timestamp, self.severity, self.message
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn event(severity: Severity, message: &str) -> Event {
        Event::new(
            LogEntry::new(severity, message),
            "2024-01-02T15:04:05.123456+01:00".to_string(),
            SourceLocation::new("/src/app/main.rs", 82, "app::main"),
        )
    }

    #[test]
    fn severities_are_ordered() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn severity_display_and_parse() {
        assert_eq!(Severity::Warning.to_string(), "WARNING");
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::Critical);
        assert!("verbose".parse::<Severity>().is_err());
    }

    #[test]
    fn errors_render_with_source() {
        assert_eq!(
            event(Severity::Error, "disk full").to_string(),
            "2024-01-02T15:04:05.123456+01:00 ERROR main.rs:82: disk full"
        );
    }

    #[test]
    fn info_renders_without_source() {
        assert_eq!(
            event(Severity::Info, "started").to_string(),
            "2024-01-02T15:04:05.123456+01:00 INFO: started"
        );
    }

    #[test]
    fn bytes_are_trimmed_and_newline_terminated() {
        assert_eq!(
            event(Severity::Warning, "spaces  \n\n").to_bytes(),
            b"2024-01-02T15:04:05.123456+01:00 WARNING: spaces\n".to_vec()
        );
    }

    #[test]
    fn default_payload_only_has_message_and_timestamp() {
        let mut e = event(Severity::Info, "hi");
        e.labels.insert("k".to_string(), "v".to_string());
        assert_eq!(
            serde_json::to_value(&e).unwrap(),
            json!({ "message": "hi", "localTimestamp": "2024-01-02T15:04:05.123456+01:00" })
        );
    }

    #[test]
    fn windows_paths_are_reduced_to_base_name() {
        assert_eq!(SourceLocation::new(r"C:\src\lib.rs", 1, "").file, "lib.rs");
    }
}
