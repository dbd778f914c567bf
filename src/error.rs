use crate::domain::cloud::CloudError;
use std::io;
use thiserror::Error;
use tokio::task::JoinError;

/// Errors returned by [`Logger::init`](crate::Logger::init) and
/// [`Logger::close`](crate::Logger::close). Logging itself never fails.
#[derive(Error, Debug)]
pub enum Error {
    /// `LogOpts::logger_name` was empty
    #[error("logger name must be set")]
    MissingLoggerName,

    /// The platform-local sink could not be opened
    #[error("local logging setup error: {0}")]
    LocalSetup(#[source] io::Error),

    /// The cloud client could not be created
    #[error("cloud logging setup error: {0}")]
    CloudSetup(#[source] CloudError),

    /// The cloud backend did not answer in time when closing, buffered entries were dropped
    #[error("cannot connect to cloud logging, skipped flush: {0}")]
    CloudUnreachable(String),

    /// The background flush task panicked
    #[error("cloud logging flush task failed: {0}")]
    FlushTask(#[source] JoinError),

    #[error("cloud logging flush error: {0}")]
    CloudFlush(#[source] CloudError),

    #[error("cloud logging close error: {0}")]
    CloudClose(#[source] CloudError),

    #[error("local logging close error: {0}")]
    LocalClose(#[source] io::Error),

    #[error("writer flush error: {0}")]
    WriterFlush(#[source] io::Error),

    /// Everything that went wrong while closing
    #[error("{} error(s) while closing the logger: {}", .0.len(), join(.0))]
    Close(Vec<Error>),
}

fn join(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
