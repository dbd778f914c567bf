//! A small buffered client for [Google Cloud Logging](https://cloud.google.com/logging).
//!
//! # Usage
//!
//! Create a [`Client`](client::Client) for a project, then one [`Logger`](logger::Logger) per
//! log. [`Logger::log`](logger::Logger::log) only buffers; call
//! [`Logger::flush`](logger::Logger::flush) periodically (and once before shutdown) to send
//! the buffered entries with a single
//! [`entries.write`](https://cloud.google.com/logging/docs/reference/v2/rest/v2/entries/write)
//! request.
//!
//! Warning: unless a fixed access token is configured, tokens are requested from the
//! metadata server, so shipping only works on Google Cloud (or with
//! [workload identity](https://cloud.google.com/iam/docs/workload-identity-federation)).
//!
//! ```no_run
//! use guestlog_google::client::{Client, ClientOptions};
//! use guestlog_google::logger::LoggerOptions;
//!
//! # async fn run() -> Result<(), guestlog_google::error::Error> {
//! let client = Client::new("my-gcp-project", ClientOptions::default())?;
//! let logger = client.logger("my-log-id", LoggerOptions::default());
//! // logger.log(...);
//! logger.flush().await?;
//! client.close();
//! # Ok(())
//! # }
//! ```

/// The connection to the Cloud Logging API
pub mod client;

/// Googlelog Error types
pub mod error;

/// Buffered loggers and the entry model
pub mod logger;

mod shipper;

pub use client::{Client, ClientOptions, ErrorHook};
pub use error::Error;
pub use logger::{Entry, Logger, LoggerOptions, Severity, SourceLocation};
