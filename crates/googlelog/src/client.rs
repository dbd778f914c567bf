use crate::error::Error;
use crate::logger::{Logger, LoggerOptions};
use crate::shipper::{Credentials, Shipper};

use google_logging2::api::{LogEntry, MonitoredResource, WriteLogEntriesRequest};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// The Cloud Logging service endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://logging.googleapis.com";

/// The hostname of the GCE metadata server, used to obtain access tokens.
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Called with every error that happens while shipping entries in the background.
pub type ErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;

/// Options for [`Client::new`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    user_agent: Option<String>,
    endpoint: String,
    metadata_host: String,
    access_token: Option<String>,
    request_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            user_agent: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            metadata_host: DEFAULT_METADATA_HOST.to_string(),
            access_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientOptions {
    /// Sets the `User-Agent` header sent with every request.
    #[must_use = "The options must be used"]
    pub fn with_user_agent(self, user_agent: &str) -> Self {
        Self {
            user_agent: Some(user_agent.to_string()),
            ..self
        }
    }

    /// Overrides the Cloud Logging endpoint, e.g. to point at an emulator.
    #[must_use = "The options must be used"]
    pub fn with_endpoint(self, endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            ..self
        }
    }

    /// Overrides the host the access token is requested from.
    #[must_use = "The options must be used"]
    pub fn with_metadata_host(self, host: &str) -> Self {
        Self {
            metadata_host: host.to_string(),
            ..self
        }
    }

    /// Uses a fixed bearer token instead of asking the metadata server.
    #[must_use = "The options must be used"]
    pub fn with_access_token(self, token: &str) -> Self {
        Self {
            access_token: Some(token.to_string()),
            ..self
        }
    }

    /// Sets the timeout applied to every HTTP request.
    #[must_use = "The options must be used"]
    pub fn with_request_timeout(self, timeout: Duration) -> Self {
        Self {
            request_timeout: timeout,
            ..self
        }
    }
}

pub(crate) struct Shared {
    pub(crate) project_id: String,
    pub(crate) shipper: Shipper,
    on_error: RwLock<ErrorHook>,
    closed: AtomicBool,
}

impl Shared {
    pub(crate) fn report(&self, err: &Error) {
        let hook = match self.on_error.read() {
            Ok(hook) => Arc::clone(&hook),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        };
        hook(err);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn log_name(&self, log_id: &str) -> String {
        format!(
            "projects/{}/logs/{}",
            self.project_id,
            log_id.replace('/', "%2F")
        )
    }
}

/// A connection to the Cloud Logging API of one project.
///
/// Cheap to clone; all clones share the same HTTP client, token cache and error hook.
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("project_id", &self.shared.project_id)
            .field("closed", &self.shared.is_closed())
            .finish()
    }
}

impl Client {
    /// Creates a client for the given project. No network traffic happens here.
    ///
    /// # Errors
    ///
    /// Will return `Err` if `project_id` is empty or the HTTP client cannot be built.
    pub fn new(project_id: &str, options: ClientOptions) -> Result<Self, Error> {
        if project_id.is_empty() {
            return Err(Error::MissingProject);
        }

        let mut builder = reqwest::Client::builder().timeout(options.request_timeout);
        if let Some(user_agent) = &options.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let http = builder.build().map_err(|e| Error::Request {
            context: "building the HTTP client".to_string(),
            source: e,
        })?;

        let credentials = match options.access_token {
            Some(token) => Credentials::Static(token),
            None => Credentials::Metadata {
                host: options.metadata_host,
            },
        };

        let default_hook: ErrorHook = Arc::new(|e: &Error| {
            eprintln!("Cloud Logging error: {}", e);
        });

        Ok(Client {
            shared: Arc::new(Shared {
                project_id: project_id.to_string(),
                shipper: Shipper::new(http, options.endpoint, credentials),
                on_error: RwLock::new(default_hook),
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.shared.project_id
    }

    /// Replaces the hook that is called when entries fail to ship. The default hook prints
    /// to stderr.
    pub fn set_on_error(&self, hook: ErrorHook) {
        match self.shared.on_error.write() {
            Ok(mut current) => *current = hook,
            Err(poisoned) => *poisoned.into_inner() = hook,
        }
    }

    /// Creates a buffered [`Logger`] writing to the log `log_id`.
    pub fn logger(&self, log_id: &str, options: LoggerOptions) -> Logger {
        Logger::new(Arc::clone(&self.shared), log_id, options)
    }

    /// Checks that the Cloud Logging API is reachable and accepts our credentials by doing a
    /// dry-run write.
    pub async fn ping(&self) -> Result<(), Error> {
        if self.shared.is_closed() {
            return Err(Error::Closed);
        }
        let log_name = self.shared.log_name("ping");
        let body = WriteLogEntriesRequest {
            dry_run: Some(true),
            log_name: Some(log_name),
            resource: Some(MonitoredResource {
                type_: Some("global".to_string()),
                labels: None,
            }),
            entries: Some(vec![LogEntry {
                insert_id: Some("ping".to_string()),
                text_payload: Some("ping".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        };
        self.shared.shipper.write(&body).await
    }

    /// Marks the client closed. Loggers created from it ignore further entries. Calling it
    /// more than once is harmless.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn empty_project_is_rejected() {
        assert!(matches!(
            Client::new("", ClientOptions::default()),
            Err(Error::MissingProject)
        ));
    }

    #[test]
    fn log_ids_are_path_escaped() {
        let client = Client::new("my-project", ClientOptions::default()).unwrap();
        assert_eq!(
            client.shared.log_name("guest/agent"),
            "projects/my-project/logs/guest%2Fagent"
        );
    }

    #[test]
    fn error_hook_can_be_replaced() {
        let client = Client::new("my-project", ClientOptions::default()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        client.set_on_error(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        client.shared.report(&Error::Closed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ping_after_close_fails_without_network() {
        let client = Client::new("my-project", ClientOptions::default()).unwrap();
        client.close();
        client.close();
        assert!(client.is_closed());
        assert!(matches!(client.ping().await, Err(Error::Closed)));
    }
}
