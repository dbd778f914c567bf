use reqwest::StatusCode;
use thiserror::Error;

/// Everything that can go wrong talking to Cloud Logging.
#[derive(Error, Debug)]
pub enum Error {
    #[error("a project ID is required to create a Cloud Logging client")]
    MissingProject,

    #[error("the Cloud Logging client has been closed")]
    Closed,

    /// A request or response body could not be (de)serialized
    #[error("JSON error while {context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },

    /// The request did not get an HTTP response
    #[error("HTTP error while {context}: {source}")]
    Request {
        context: String,
        source: reqwest::Error,
    },

    #[error("the metadata server returned no access token")]
    MissingAccessToken,

    #[error("the metadata server returned no token expiry")]
    MissingTokenExpiry,

    #[error("{context} failed with HTTP status {status}: {body}")]
    Status {
        context: String,
        status: StatusCode,
        body: String,
    },
}

impl From<reqwest::Error> for Error {
    fn from(source: reqwest::Error) -> Self {
        Error::Request {
            context: "sending a request".to_string(),
            source,
        }
    }
}
