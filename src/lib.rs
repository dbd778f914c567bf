//! Structured logging for processes running on Compute Engine and GKE nodes.
//!
//! A [`Logger`] takes one log call and hands it to every configured sink:
//!
//! - the platform-local sink: syslog (facility `daemon`) on Unix, the `COM1` serial port and
//!   the Event Log on Windows;
//! - any number of byte writers, e.g. stderr or a file;
//! - Google Cloud Logging, with the entry attached to the `gce_instance` or `k8s_node` resource
//!   the process runs on.
//!
//! ```no_run
//! use guestlog::{infof, LogOpts, Logger};
//!
//! # async fn example() -> Result<(), guestlog::Error> {
//! let logger = Logger::init(
//!     LogOpts::new("my-agent")
//!         .with_project("my-project")
//!         .with_writer(guestlog::shared_writer(std::io::stderr())),
//! )
//! .await?;
//! infof!(logger, "started with {} workers", 4);
//! logger.close().await
//! # }
//! ```

#[macro_use]
extern crate lazy_static;

mod config;
pub mod domain;
mod enrich;
mod error;
pub mod infra;
mod logger;
pub mod resource;
pub mod severity;
pub mod testing;

pub use domain::entry::{Event, LogEntry, Severity, SourceLocation};
pub use domain::metadata::{FixedMetadataProvider, MetadataProvider};
pub use error::Error;
pub use logger::{shared_writer, LogOpts, Logger, SharedWriter};

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($logger:expr, $severity:expr, $($arg:tt)+) => {
        $logger.log(
            $crate::LogEntry::new($severity, format!($($arg)+))
                .with_source($crate::SourceLocation::new(file!(), line!(), module_path!())),
        )
    };
}

/// Logs a formatted message at Debug, if debug logging is on. The arguments are not
/// evaluated otherwise.
#[macro_export]
macro_rules! debugf {
    ($logger:expr, $($arg:tt)+) => {{
        let logger = &$logger;
        if logger.debug_enabled() {
            $crate::__log_at!(logger, $crate::Severity::Debug, $($arg)+)
        }
    }};
}

/// Logs a formatted message at Info.
#[macro_export]
macro_rules! infof {
    ($logger:expr, $($arg:tt)+) => {
        $crate::__log_at!($logger, $crate::Severity::Info, $($arg)+)
    };
}

/// Logs a formatted message at Warning.
#[macro_export]
macro_rules! warningf {
    ($logger:expr, $($arg:tt)+) => {
        $crate::__log_at!($logger, $crate::Severity::Warning, $($arg)+)
    };
}

/// Logs a formatted message at Error.
#[macro_export]
macro_rules! errorf {
    ($logger:expr, $($arg:tt)+) => {
        $crate::__log_at!($logger, $crate::Severity::Error, $($arg)+)
    };
}

/// Logs a formatted message at Critical, runs the fatal hooks, closes the logger and exits
/// with status 1. Only usable in async code.
#[macro_export]
macro_rules! fatalf {
    ($logger:expr, $($arg:tt)+) => {
        match $logger
            .fatal(
                $crate::LogEntry::new($crate::Severity::Critical, format!($($arg)+))
                    .with_source($crate::SourceLocation::new(file!(), line!(), module_path!())),
            )
            .await
        {}
    };
}
