//! Infra contains infrastructure specific implementations of things in the [`domain`](crate::domain)
//! module.
pub mod cloud_logging;
#[cfg(windows)]
pub mod event_log;
pub mod gce_metadata;
pub mod serial;
#[cfg(unix)]
pub mod syslog;

pub use cloud_logging::GoogleCloudConnector;
pub use gce_metadata::GceMetadataProvider;

use crate::domain::local::LocalSink;
use std::io;

/// Opens the platform-local sink: syslog on Unix; on Windows the `COM1` serial port plus the
/// Event Log.
#[cfg(unix)]
pub fn local_sink(logger_name: &str) -> io::Result<Box<dyn LocalSink>> {
    Ok(Box::new(syslog::SyslogSink::open(logger_name)?))
}

/// Opens the platform-local sink: syslog on Unix; on Windows the `COM1` serial port plus the
/// Event Log, with `logger_name` as event source.
#[cfg(windows)]
pub fn local_sink(logger_name: &str) -> io::Result<Box<dyn LocalSink>> {
    use crate::domain::local::TeeSink;

    let serial = serial::SerialSink::open_port(serial::COM1, serial::BAUD_RATE)?;
    let event_log = event_log::EventLogSink::open(logger_name)?;
    Ok(Box::new(TeeSink::new(vec![
        Box::new(serial),
        Box::new(event_log),
    ])))
}

#[cfg(not(any(unix, windows)))]
pub fn local_sink(_logger_name: &str) -> io::Result<Box<dyn LocalSink>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "no local log sink on this platform",
    ))
}
