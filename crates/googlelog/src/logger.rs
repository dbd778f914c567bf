use crate::client::Shared;
use crate::error::Error;

use google_logging2::api::{
    LogEntry, LogEntrySourceLocation, MonitoredResource, WriteLogEntriesRequest,
};

use chrono::{DateTime, Utc};
use serde_json::Value;

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

const DEFAULT_BUFFER_LIMIT: usize = 1000;

/// The [LogSeverity](https://cloud.google.com/logging/docs/reference/v2/rest/v2/LogEntry#logseverity)
/// scale of Cloud Logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Default,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Default => "DEFAULT",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Alert => "ALERT",
            Severity::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where in the source code an entry was produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: i64,
    pub function: String,
}

/// One entry handed to [`Logger::log`].
#[derive(Debug, Clone)]
pub struct Entry {
    pub severity: Severity,
    /// Objects become the `jsonPayload`, strings the `textPayload`.
    pub payload: Value,
    pub labels: HashMap<String, String>,
    pub source_location: Option<SourceLocation>,
    pub timestamp: DateTime<Utc>,
}

/// Options for [`Client::logger`](crate::client::Client::logger)
#[derive(Debug, Clone)]
pub struct LoggerOptions {
    resource_type: Option<String>,
    resource_labels: HashMap<String, String>,
    buffer_limit: usize,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        LoggerOptions {
            resource_type: None,
            resource_labels: HashMap::new(),
            buffer_limit: DEFAULT_BUFFER_LIMIT,
        }
    }
}

impl LoggerOptions {
    /// Sets the monitored resource attached to every write. Without it the API picks the
    /// `global` resource.
    ///
    /// These labels populate the `labels` field of the `resource`
    /// [MonitoredResource](https://cloud.google.com/logging/docs/reference/v2/rest/v2/MonitoredResource).
    #[must_use = "The options must be used"]
    pub fn with_resource(self, resource_type: &str, labels: HashMap<String, String>) -> Self {
        Self {
            resource_type: Some(resource_type.to_string()),
            resource_labels: labels,
            ..self
        }
    }

    /// Sets how many entries may wait for the next flush. When full, the oldest entry is
    /// dropped.
    #[must_use = "The options must be used"]
    pub fn with_buffer_limit(self, limit: usize) -> Self {
        Self {
            buffer_limit: limit.max(1),
            ..self
        }
    }
}

#[derive(Default)]
struct Buffer {
    entries: VecDeque<LogEntry>,
    dropped: u64,
}

/// A buffered writer for one log.
///
/// [`log`](Logger::log) only appends to an in-memory buffer; entries reach the API on
/// [`flush`](Logger::flush).
#[derive(Clone)]
pub struct Logger {
    shared: Arc<Shared>,
    log_name: String,
    resource: Option<MonitoredResource>,
    limit: usize,
    buffer: Arc<Mutex<Buffer>>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("log_name", &self.log_name)
            .field("resource", &self.resource)
            .field("buffered", &self.buffered())
            .finish()
    }
}

impl Logger {
    pub(crate) fn new(shared: Arc<Shared>, log_id: &str, options: LoggerOptions) -> Self {
        let log_name = shared.log_name(log_id);
        let resource = options.resource_type.map(|type_| MonitoredResource {
            type_: Some(type_),
            labels: if options.resource_labels.is_empty() {
                None
            } else {
                Some(options.resource_labels)
            },
        });
        Logger {
            shared,
            log_name,
            resource,
            limit: options.buffer_limit,
            buffer: Arc::new(Mutex::new(Buffer::default())),
        }
    }

    pub fn log_name(&self) -> &str {
        &self.log_name
    }

    fn construct_log_entry(entry: Entry) -> LogEntry {
        let (json_payload, text_payload) = match entry.payload {
            Value::Object(map) => (Some(map.into_iter().collect::<HashMap<_, _>>()), None),
            Value::String(text) => (None, Some(text)),
            other => (Some(HashMap::from([("value".to_string(), other)])), None),
        };

        let source_location = entry.source_location.map(|source| LogEntrySourceLocation {
            file: Some(source.file),
            line: Some(source.line),
            function: if source.function.is_empty() {
                None
            } else {
                Some(source.function)
            },
        });

        LogEntry {
            json_payload,
            text_payload,
            labels: if entry.labels.is_empty() {
                None
            } else {
                Some(entry.labels)
            },
            severity: Some(entry.severity.as_str().to_string()),
            source_location,
            timestamp: Some(entry.timestamp),
            ..Default::default()
        }
    }

    /// Buffers an entry. Never blocks on the network. Entries logged after the client was
    /// closed are discarded.
    pub fn log(&self, entry: Entry) {
        if self.shared.is_closed() {
            return;
        }
        let log_entry = Self::construct_log_entry(entry);
        let mut buffer = match self.buffer.lock() {
            Ok(buffer) => buffer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if buffer.entries.len() >= self.limit {
            buffer.entries.pop_front();
            buffer.dropped += 1;
        }
        buffer.entries.push_back(log_entry);
    }

    /// The number of entries waiting for the next flush.
    pub fn buffered(&self) -> usize {
        match self.buffer.lock() {
            Ok(buffer) => buffer.entries.len(),
            Err(poisoned) => poisoned.into_inner().entries.len(),
        }
    }

    /// The number of entries discarded because the buffer was full.
    pub fn dropped(&self) -> u64 {
        match self.buffer.lock() {
            Ok(buffer) => buffer.dropped,
            Err(poisoned) => poisoned.into_inner().dropped,
        }
    }

    fn take_buffered(&self) -> Vec<LogEntry> {
        let mut buffer = match self.buffer.lock() {
            Ok(buffer) => buffer,
            Err(poisoned) => poisoned.into_inner(),
        };
        buffer.entries.drain(..).collect()
    }

    /// Sends everything buffered so far in a single write. Failures are also passed to the
    /// client's error hook; the entries of a failed write are not retried.
    pub async fn flush(&self) -> Result<(), Error> {
        let entries = self.take_buffered();
        if entries.is_empty() {
            return Ok(());
        }

        let body = WriteLogEntriesRequest {
            log_name: Some(self.log_name.clone()),
            resource: self.resource.clone(),
            entries: Some(entries),
            ..Default::default()
        };

        let result = self.shared.shipper.write(&body).await;
        if let Err(e) = &result {
            self.shared.report(e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Client, ClientOptions};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn entry(message: &str) -> Entry {
        Entry {
            severity: Severity::Warning,
            payload: json!({ "message": message }),
            labels: HashMap::from([("k".to_string(), "v".to_string())]),
            source_location: Some(SourceLocation {
                file: "main.rs".to_string(),
                line: 12,
                function: "app::main".to_string(),
            }),
            timestamp: Utc::now(),
        }
    }

    fn client() -> Client {
        Client::new("my-project", ClientOptions::default()).unwrap()
    }

    #[test]
    fn entry_is_converted_to_api_type() {
        let log_entry = Logger::construct_log_entry(entry("hello"));
        assert_eq!(log_entry.severity.as_deref(), Some("WARNING"));
        assert_eq!(
            log_entry.json_payload.unwrap().get("message"),
            Some(&json!("hello"))
        );
        assert_eq!(log_entry.text_payload, None);
        assert_eq!(
            log_entry.labels.unwrap().get("k").map(String::as_str),
            Some("v")
        );
        let source = log_entry.source_location.unwrap();
        assert_eq!(source.file.as_deref(), Some("main.rs"));
        assert_eq!(source.line, Some(12));
        assert_eq!(source.function.as_deref(), Some("app::main"));
    }

    #[test]
    fn string_payload_becomes_text_payload() {
        let mut e = entry("x");
        e.payload = json!("plain text");
        let log_entry = Logger::construct_log_entry(e);
        assert_eq!(log_entry.text_payload.as_deref(), Some("plain text"));
        assert!(log_entry.json_payload.is_none());
    }

    #[test]
    fn full_buffer_drops_oldest() {
        let logger = client().logger("test", LoggerOptions::default().with_buffer_limit(2));
        logger.log(entry("one"));
        logger.log(entry("two"));
        logger.log(entry("three"));
        assert_eq!(logger.buffered(), 2);
        assert_eq!(logger.dropped(), 1);
        let remaining = logger.take_buffered();
        assert_eq!(
            remaining[0].json_payload.as_ref().unwrap().get("message"),
            Some(&json!("two"))
        );
    }

    #[test]
    fn entries_after_close_are_ignored() {
        let client = client();
        let logger = client.logger("test", LoggerOptions::default());
        client.close();
        logger.log(entry("late"));
        assert_eq!(logger.buffered(), 0);
    }

    #[test]
    fn resource_is_attached_to_logger() {
        let labels = HashMap::from([("zone".to_string(), "europe-west1-b".to_string())]);
        let logger = client().logger(
            "test",
            LoggerOptions::default().with_resource("gce_instance", labels.clone()),
        );
        let resource = logger.resource.clone().unwrap();
        assert_eq!(resource.type_.as_deref(), Some("gce_instance"));
        assert_eq!(resource.labels, Some(labels));
        assert_eq!(logger.log_name(), "projects/my-project/logs/test");
    }

    #[tokio::test]
    async fn flushing_an_empty_buffer_does_nothing() {
        let logger = client().logger("test", LoggerOptions::default());
        assert!(logger.flush().await.is_ok());
    }
}
