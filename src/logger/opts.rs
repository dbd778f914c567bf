use crate::domain::cloud::CloudConnector;
use crate::domain::local::LocalSink;
use crate::domain::metadata::MetadataProvider;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A byte sink that receives every rendered line. Shared so the caller can keep a handle to it.
pub type SharedWriter = Arc<Mutex<dyn Write + Send>>;

/// Wraps `writer` for use with [`LogOpts::with_writer`].
pub fn shared_writer<W: Write + Send + 'static>(writer: W) -> SharedWriter {
    Arc::new(Mutex::new(writer))
}

/// Options for [`Logger::init`](crate::Logger::init).
pub struct LogOpts {
    /// Identifies the log in Cloud Logging and tags local syslog lines. Required.
    pub logger_name: String,
    /// The Cloud Logging project. Cloud logging is off when empty.
    pub project_name: String,
    pub disable_local_logging: bool,
    pub disable_cloud_logging: bool,
    /// Whether Debug entries are emitted.
    pub debug: bool,
    /// Extra sinks, written in order.
    pub writers: Vec<SharedWriter>,
    pub user_agent: Option<String>,
    /// `projects/<p>/zones/<z>/instanceGroupManagers/<name>` (or `regions/<r>`) of the
    /// managed instance group this instance belongs to.
    pub mig: String,
    /// Interval of the background flush to Cloud Logging.
    pub flush_interval: Duration,
    /// How long [`Logger::close`](crate::Logger::close) waits for Cloud Logging to answer.
    pub close_timeout: Duration,
    pub(crate) metadata: Option<Arc<dyn MetadataProvider>>,
    pub(crate) cloud: Option<Arc<dyn CloudConnector>>,
    pub(crate) local_sink: Option<Box<dyn LocalSink>>,
}

impl Default for LogOpts {
    fn default() -> Self {
        LogOpts {
            logger_name: String::new(),
            project_name: String::new(),
            disable_local_logging: false,
            disable_cloud_logging: false,
            debug: false,
            writers: Vec::new(),
            user_agent: None,
            mig: String::new(),
            flush_interval: Duration::from_secs(5),
            close_timeout: Duration::from_secs(3),
            metadata: None,
            cloud: None,
            local_sink: None,
        }
    }
}

impl fmt::Debug for LogOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogOpts")
            .field("logger_name", &self.logger_name)
            .field("project_name", &self.project_name)
            .field("disable_local_logging", &self.disable_local_logging)
            .field("disable_cloud_logging", &self.disable_cloud_logging)
            .field("debug", &self.debug)
            .field("writers", &self.writers.len())
            .field("user_agent", &self.user_agent)
            .field("mig", &self.mig)
            .field("flush_interval", &self.flush_interval)
            .field("close_timeout", &self.close_timeout)
            .finish_non_exhaustive()
    }
}

impl LogOpts {
    pub fn new<S: Into<String>>(logger_name: S) -> Self {
        LogOpts {
            logger_name: logger_name.into(),
            ..Default::default()
        }
    }

    #[must_use = "this returns the updated options"]
    pub fn with_project<S: Into<String>>(self, project_name: S) -> Self {
        Self {
            project_name: project_name.into(),
            ..self
        }
    }

    #[must_use = "this returns the updated options"]
    pub fn with_debug(self, debug: bool) -> Self {
        Self { debug, ..self }
    }

    #[must_use = "this returns the updated options"]
    pub fn without_local_logging(self) -> Self {
        Self {
            disable_local_logging: true,
            ..self
        }
    }

    #[must_use = "this returns the updated options"]
    pub fn without_cloud_logging(self) -> Self {
        Self {
            disable_cloud_logging: true,
            ..self
        }
    }

    #[must_use = "this returns the updated options"]
    pub fn with_writer(mut self, writer: SharedWriter) -> Self {
        self.writers.push(writer);
        self
    }

    #[must_use = "this returns the updated options"]
    pub fn with_user_agent<S: Into<String>>(self, user_agent: S) -> Self {
        Self {
            user_agent: Some(user_agent.into()),
            ..self
        }
    }

    #[must_use = "this returns the updated options"]
    pub fn with_mig<S: Into<String>>(self, mig: S) -> Self {
        Self {
            mig: mig.into(),
            ..self
        }
    }

    #[must_use = "this returns the updated options"]
    pub fn with_flush_interval(self, flush_interval: Duration) -> Self {
        Self {
            flush_interval,
            ..self
        }
    }

    #[must_use = "this returns the updated options"]
    pub fn with_close_timeout(self, close_timeout: Duration) -> Self {
        Self {
            close_timeout,
            ..self
        }
    }

    /// Replaces the live Compute Engine metadata server.
    #[must_use = "this returns the updated options"]
    pub fn with_metadata_provider(self, metadata: Arc<dyn MetadataProvider>) -> Self {
        Self {
            metadata: Some(metadata),
            ..self
        }
    }

    /// Replaces Google Cloud Logging.
    #[must_use = "this returns the updated options"]
    pub fn with_cloud_connector(self, cloud: Arc<dyn CloudConnector>) -> Self {
        Self {
            cloud: Some(cloud),
            ..self
        }
    }

    /// Replaces the platform sink (syslog, or the serial port on Windows).
    #[must_use = "this returns the updated options"]
    pub fn with_local_sink(self, local_sink: Box<dyn LocalSink>) -> Self {
        Self {
            local_sink: Some(local_sink),
            ..self
        }
    }
}
