//! Maps [`Severity`] onto the severity models of the individual sinks.

use crate::domain::cloud::CloudSeverity;
use crate::domain::entry::Severity;

/// The Cloud Logging severity of an entry.
pub fn cloud_severity(severity: Severity) -> CloudSeverity {
    match severity {
        Severity::Debug => CloudSeverity::Debug,
        Severity::Info => CloudSeverity::Info,
        Severity::Warning => CloudSeverity::Warning,
        Severity::Error => CloudSeverity::Error,
        Severity::Critical => CloudSeverity::Critical,
    }
}

/// Like [`cloud_severity`] for a raw level number (`0` = debug .. `4` = critical). Unknown
/// numbers map to [`CloudSeverity::Default`].
pub fn cloud_severity_from_raw(level: u8) -> CloudSeverity {
    Severity::from_raw(level)
        .map(cloud_severity)
        .unwrap_or(CloudSeverity::Default)
}

impl Severity {
    /// The severity for a raw level number, `0` = debug .. `4` = critical.
    pub fn from_raw(level: u8) -> Option<Severity> {
        match level {
            0 => Some(Severity::Debug),
            1 => Some(Severity::Info),
            2 => Some(Severity::Warning),
            3 => Some(Severity::Error),
            4 => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl From<slog::Level> for Severity {
    fn from(level: slog::Level) -> Self {
        match level {
            slog::Level::Critical => Severity::Critical,
            slog::Level::Error => Severity::Error,
            slog::Level::Warning => Severity::Warning,
            slog::Level::Info => Severity::Info,
            slog::Level::Debug | slog::Level::Trace => Severity::Debug,
        }
    }
}

/// The syslog severity of an entry.
#[cfg(unix)]
pub fn syslog_severity(severity: Severity) -> fasyslog::Severity {
    match severity {
        Severity::Debug => fasyslog::Severity::DEBUG,
        Severity::Info => fasyslog::Severity::INFORMATIONAL,
        Severity::Warning => fasyslog::Severity::WARNING,
        Severity::Error => fasyslog::Severity::ERROR,
        Severity::Critical => fasyslog::Severity::CRITICAL,
    }
}

/// The entry types of the Windows Event Log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLogType {
    Information,
    Warning,
    Error,
}

/// The Event Log type of an entry. The Event Log has no debug or critical types, so Debug is
/// logged as Information and Critical as Error.
pub fn event_log_type(severity: Severity) -> EventLogType {
    match severity {
        Severity::Debug | Severity::Info => EventLogType::Information,
        Severity::Warning => EventLogType::Warning,
        Severity::Error | Severity::Critical => EventLogType::Error,
    }
}
