//! The facade: one [`Logger`] fans every entry out to the platform-local sink, the configured
//! writers and Cloud Logging.

mod drain;
mod opts;

pub use opts::{shared_writer, LogOpts, SharedWriter};

use crate::domain::cloud::{
    CloudClient, CloudConnector, CloudEntry, CloudLogger, CloudSourceLocation,
};
use crate::domain::entry::{Event, LogEntry, Severity};
use crate::domain::local::LocalSink;
use crate::enrich::enrich;
use crate::error::Error;
use crate::infra::{self, GceMetadataProvider, GoogleCloudConnector};
use crate::resource;
use crate::severity::cloud_severity;
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt::{self, Display};
use std::future::Future;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinHandle};

type FatalHook = Box<dyn FnOnce() + Send>;

/// The active connection to Cloud Logging.
#[derive(Debug)]
struct CloudState {
    client: Box<dyn CloudClient>,
    logger: Arc<dyn CloudLogger>,
    common_labels: HashMap<String, String>,
}

/// The background task that flushes the cloud logger periodically.
#[derive(Debug)]
struct Flusher {
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl Flusher {
    fn spawn(logger: Arc<dyn CloudLogger>, interval: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.recv() => break,
                }
                // A flush in progress is abandoned on shutdown. Upload errors reach the
                // client's error hook.
                tokio::select! {
                    _ = logger.flush() => {}
                    _ = shutdown_rx.recv() => break,
                }
            }
        });
        Flusher { shutdown, handle }
    }

    async fn stop(self) -> Result<(), JoinError> {
        let _ = self.shutdown.send(());
        self.handle.await
    }
}

/// Logs to syslog (Unix) or the serial port (Windows), to any number of writers and to Google
/// Cloud Logging.
///
/// Create one with [`Logger::init`] and release it with [`Logger::close`]. Logging never
/// fails: a sink that cannot write is reported on stderr and the other sinks still get the
/// entry.
pub struct Logger {
    name: String,
    debug: AtomicBool,
    local: Mutex<Option<Box<dyn LocalSink>>>,
    writers: Vec<SharedWriter>,
    cloud: RwLock<Option<CloudState>>,
    flusher: Mutex<Option<Flusher>>,
    fatal_hooks: Mutex<Vec<FatalHook>>,
    close_timeout: Duration,
    closed: AtomicBool,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("debug", &self.debug_enabled())
            .field("writers", &self.writers.len())
            .field("cloud", &self.cloud_enabled())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn fallback_to_stderr<E: Display>(sink: &str, result: Result<(), E>) {
    if let Err(err) = result {
        eprintln!("The {} could not log to its destination: {}", sink, err);
    }
}

impl Logger {
    /// Opens the sinks described by `opts`.
    ///
    /// Only a missing logger name and a local sink that cannot be opened are errors. When
    /// Cloud Logging cannot be set up that is logged and the logger continues without it.
    pub async fn init(opts: LogOpts) -> Result<Logger, Error> {
        if opts.logger_name.is_empty() {
            return Err(Error::MissingLoggerName);
        }

        let local = match (opts.disable_local_logging, opts.local_sink) {
            (true, _) => None,
            (false, Some(sink)) => Some(sink),
            (false, None) => {
                Some(infra::local_sink(&opts.logger_name).map_err(Error::LocalSetup)?)
            }
        };

        let logger = Logger {
            name: opts.logger_name,
            debug: AtomicBool::new(opts.debug),
            local: Mutex::new(local),
            writers: opts.writers,
            cloud: RwLock::new(None),
            flusher: Mutex::new(None),
            fatal_hooks: Mutex::new(Vec::new()),
            close_timeout: opts.close_timeout,
            closed: AtomicBool::new(false),
        };

        if opts.disable_cloud_logging || opts.project_name.is_empty() {
            return Ok(logger);
        }

        let connector: Arc<dyn CloudConnector> = opts
            .cloud
            .unwrap_or_else(|| Arc::new(GoogleCloudConnector::default()));
        let client = match connector
            .connect(&opts.project_name, opts.user_agent.as_deref())
            .await
        {
            Ok(client) => client,
            Err(err) => {
                logger.error(format_args!(
                    "Continuing without cloud logging due to error in initialization: {}",
                    Error::CloudSetup(err)
                ));
                return Ok(logger);
            }
        };
        // Failed uploads are not worth reporting anywhere.
        client.set_on_error(Arc::new(|_: &(dyn std::error::Error + 'static)| {}));

        let metadata = opts
            .metadata
            .unwrap_or_else(|| Arc::new(GceMetadataProvider::new()));
        let resolution = resource::resolve(metadata.as_ref(), &opts.mig).await;
        let cloud_logger = client.logger(&logger.name, &resolution.resource);

        *lock(&logger.flusher) = Some(Flusher::spawn(
            Arc::clone(&cloud_logger),
            opts.flush_interval,
        ));
        *logger.cloud_mut() = Some(CloudState {
            client,
            logger: cloud_logger,
            common_labels: resolution.common_labels,
        });
        Ok(logger)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// Turns emitting Debug entries on or off.
    pub fn set_debug_logging(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed)
    }

    /// Whether entries are forwarded to Cloud Logging.
    pub fn cloud_enabled(&self) -> bool {
        match self.cloud.read() {
            Ok(cloud) => cloud.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }

    /// The labels attached to every cloud entry, if cloud logging is active.
    pub fn cloud_labels(&self) -> Option<HashMap<String, String>> {
        let cloud = match self.cloud.read() {
            Ok(cloud) => cloud,
            Err(poisoned) => poisoned.into_inner(),
        };
        cloud.as_ref().map(|state| state.common_labels.clone())
    }

    fn cloud_mut(&self) -> std::sync::RwLockWriteGuard<'_, Option<CloudState>> {
        match self.cloud.write() {
            Ok(cloud) => cloud,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Logs `entry` to every sink. Without an explicit source or call depth, the entry is
    /// attributed to the caller of this method.
    #[track_caller]
    pub fn log(&self, entry: LogEntry) {
        self.dispatch(entry, Location::caller())
    }

    #[track_caller]
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        if self.debug_enabled() {
            self.dispatch(LogEntry::new(Severity::Debug, args.to_string()), Location::caller())
        }
    }

    #[track_caller]
    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.dispatch(LogEntry::new(Severity::Info, args.to_string()), Location::caller())
    }

    #[track_caller]
    pub fn warning(&self, args: fmt::Arguments<'_>) {
        self.dispatch(LogEntry::new(Severity::Warning, args.to_string()), Location::caller())
    }

    #[track_caller]
    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.dispatch(LogEntry::new(Severity::Error, args.to_string()), Location::caller())
    }

    fn dispatch(&self, entry: LogEntry, caller: &'static Location<'static>) {
        if entry.severity == Severity::Debug && !self.debug_enabled() {
            return;
        }
        let event = enrich(entry, caller);
        self.write_local(&event);
        self.write_writers(&event);
        self.write_cloud(event);
    }

    fn write_local(&self, event: &Event) {
        if let Some(sink) = lock(&self.local).as_mut() {
            fallback_to_stderr("local sink", sink.write(event.severity, &event.to_string()));
        }
    }

    fn write_writers(&self, event: &Event) {
        if self.writers.is_empty() {
            return;
        }
        let line = event.to_bytes();
        for writer in &self.writers {
            fallback_to_stderr("writer", lock(writer).write_all(&line));
        }
    }

    fn write_cloud(&self, event: Event) {
        let cloud = match self.cloud.read() {
            Ok(cloud) => cloud,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(cloud) = cloud.as_ref() else {
            return;
        };

        let payload = match &event.structured_payload {
            Some(payload) => payload.clone(),
            None => serde_json::to_value(&event)
                .unwrap_or_else(|_| Value::String(event.message.clone())),
        };
        let mut labels = cloud.common_labels.clone();
        labels.extend(event.labels);
        cloud.logger.log(CloudEntry {
            severity: cloud_severity(event.severity),
            payload,
            labels,
            source_location: Some(CloudSourceLocation {
                file: event.source.file,
                line: i64::from(event.source.line),
                function: event.source.function,
            }),
            timestamp: chrono::Utc::now(),
        });
    }

    /// Flushes and releases every sink. Calling it again does nothing.
    ///
    /// When Cloud Logging does not answer within the close timeout the buffered cloud
    /// entries are dropped rather than holding up shutdown.
    pub async fn close(&self) -> Result<(), Error> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut errors = Vec::new();

        let flusher = lock(&self.flusher).take();
        if let Some(flusher) = flusher {
            if let Err(err) = flusher.stop().await {
                errors.push(Error::FlushTask(err));
            }
        }

        let cloud = self.cloud_mut().take();
        if let Some(cloud) = cloud {
            let ping = tokio::time::timeout(self.close_timeout, cloud.client.ping());
            let unreachable = match ping.await {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err.to_string()),
                Err(elapsed) => Some(elapsed.to_string()),
            };
            match unreachable {
                None => {
                    if let Err(err) = cloud.logger.flush().await {
                        errors.push(Error::CloudFlush(err));
                    }
                    if let Err(err) = cloud.client.close().await {
                        errors.push(Error::CloudClose(err));
                    }
                }
                Some(reason) => {
                    self.warning(format_args!(
                        "Cannot connect to cloud logging, skipping flush: {}",
                        reason
                    ));
                    errors.push(Error::CloudUnreachable(reason));
                }
            }
        }

        let local = lock(&self.local).take();
        if let Some(mut sink) = local {
            if let Err(err) = sink.close() {
                errors.push(Error::LocalClose(err));
            }
        }

        for writer in &self.writers {
            if let Err(err) = lock(writer).flush() {
                errors.push(Error::WriterFlush(err));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Close(errors))
        }
    }

    /// Registers `hook` to run when [`Logger::fatal`] is called, before the logger is closed.
    pub fn defer_fatal<F: FnOnce() + Send + 'static>(&self, hook: F) {
        lock(&self.fatal_hooks).push(Box::new(hook));
    }

    /// Runs and forgets the registered fatal hooks, in the order they were registered.
    pub(crate) fn run_fatal_hooks(&self) {
        let hooks = std::mem::take(&mut *lock(&self.fatal_hooks));
        for hook in hooks {
            hook();
        }
    }

    /// Logs `entry` at Critical, runs the fatal hooks, closes the logger and exits the process
    /// with status 1. The entry is logged right away; the rest happens when the returned
    /// future is awaited, which never completes:
    ///
    /// ```no_run
    /// # async fn example(logger: guestlog::Logger) {
    /// use guestlog::{LogEntry, Severity};
    /// match logger.fatal(LogEntry::new(Severity::Critical, "no disk")).await {}
    /// # }
    /// ```
    #[track_caller]
    pub fn fatal(&self, entry: LogEntry) -> impl Future<Output = Infallible> + Send + '_ {
        let entry = LogEntry {
            severity: Severity::Critical,
            ..entry
        };
        self.dispatch(entry, Location::caller());
        async move {
            self.run_fatal_hooks();
            fallback_to_stderr("logger", self.close().await);
            exit(1)
        }
    }
}

fn exit(code: i32) -> Infallible {
    std::process::exit(code)
}

impl Drop for Logger {
    fn drop(&mut self) {
        if let Some(flusher) = lock(&self.flusher).take() {
            flusher.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cloud::CloudSeverity;
    use crate::domain::metadata::FixedMetadataProvider;
    use crate::resource::{GCE_INSTANCE, MIG_NAME_LABEL, MIG_ZONE_LABEL};
    use crate::domain::cloud::CloudError;
    use crate::resource::ResourceDescriptor;
    use crate::testing::{BrokenSink, FailingConnector, RecordingCloud, RecordingSink};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeSet;

    #[derive(Debug, Clone, Copy)]
    enum Misbehaviour {
        /// `flush` and `ping` never complete.
        Hang,
        /// The first `flush` panics.
        PanicOnce,
    }

    #[derive(Debug, Clone)]
    struct MisbehavingCloud {
        misbehaviour: Misbehaviour,
        panicked: Arc<AtomicBool>,
    }

    impl MisbehavingCloud {
        fn new(misbehaviour: Misbehaviour) -> Self {
            MisbehavingCloud {
                misbehaviour,
                panicked: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait]
    impl CloudConnector for MisbehavingCloud {
        async fn connect(
            &self,
            _project_id: &str,
            _user_agent: Option<&str>,
        ) -> Result<Box<dyn CloudClient>, CloudError> {
            Ok(Box::new(self.clone()))
        }
    }

    #[async_trait]
    impl CloudClient for MisbehavingCloud {
        fn set_on_error(&self, _hook: crate::domain::cloud::CloudErrorHook) {}

        fn logger(&self, _log_id: &str, _resource: &ResourceDescriptor) -> Arc<dyn CloudLogger> {
            Arc::new(self.clone())
        }

        async fn ping(&self) -> Result<(), CloudError> {
            if let Misbehaviour::Hang = self.misbehaviour {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn close(&self) -> Result<(), CloudError> {
            Ok(())
        }
    }

    #[async_trait]
    impl CloudLogger for MisbehavingCloud {
        fn log(&self, _entry: CloudEntry) {}

        async fn flush(&self) -> Result<(), CloudError> {
            match self.misbehaviour {
                Misbehaviour::Hang => std::future::pending::<()>().await,
                Misbehaviour::PanicOnce => {
                    if !self.panicked.swap(true, Ordering::SeqCst) {
                        panic!("flush blew up");
                    }
                }
            }
            Ok(())
        }
    }

    fn misbehaving(misbehaviour: Misbehaviour) -> LogOpts {
        LogOpts::new("agent")
            .with_project("my-project")
            .without_local_logging()
            .with_cloud_connector(Arc::new(MisbehavingCloud::new(misbehaviour)))
            .with_metadata_provider(Arc::new(FixedMetadataProvider::default()))
            .with_flush_interval(Duration::from_millis(50))
            .with_close_timeout(Duration::from_millis(200))
    }

    fn gce() -> Arc<FixedMetadataProvider> {
        Arc::new(FixedMetadataProvider {
            on_gce: true,
            instance_name: "vm-1".to_string(),
            instance_id: "1234".to_string(),
            zone: "europe-west1-b".to_string(),
            project_id: "my-project".to_string(),
            ..Default::default()
        })
    }

    fn opts(sink: &RecordingSink, cloud: &RecordingCloud) -> LogOpts {
        LogOpts::new("agent")
            .with_project("my-project")
            .with_local_sink(Box::new(sink.clone()))
            .with_cloud_connector(Arc::new(cloud.clone()))
            .with_metadata_provider(gce())
    }

    fn written(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
    }

    #[tokio::test]
    async fn logger_name_is_required() {
        let result = Logger::init(LogOpts::default().without_local_logging()).await;
        assert!(matches!(result, Err(Error::MissingLoggerName)));
    }

    #[tokio::test]
    async fn fans_out_to_every_sink() {
        let sink = RecordingSink::default();
        let cloud = RecordingCloud::default();
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let logger = Logger::init(opts(&sink, &cloud).with_writer(buffer.clone()))
            .await
            .unwrap();

        logger.info(format_args!("started {}", 1));

        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, Severity::Info);
        assert!(lines[0].1.ends_with(" INFO: started 1"), "{}", lines[0].1);
        assert_eq!(written(&buffer), format!("{}\n", lines[0].1));

        let entries = cloud.buffered();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].severity, CloudSeverity::Info);
        assert_eq!(entries[0].payload["message"], json!("started 1"));
        assert!(entries[0].payload["localTimestamp"].is_string());
        assert_eq!(
            entries[0].source_location.as_ref().map(|s| s.file.as_str()),
            Some("logger.rs")
        );
        logger.close().await.unwrap();
    }

    #[tokio::test]
    async fn cloud_client_is_set_up_from_options() {
        let sink = RecordingSink::default();
        let cloud = RecordingCloud::default();
        let logger = Logger::init(
            opts(&sink, &cloud)
                .with_user_agent("agent/1.0")
                .with_mig("projects/p/zones/europe-west1-b/instanceGroupManagers/pool"),
        )
        .await
        .unwrap();

        assert!(logger.cloud_enabled());
        assert!(cloud.error_hook_installed());
        assert_eq!(cloud.project_id(), "my-project");
        assert_eq!(cloud.user_agent(), Some("agent/1.0".to_string()));
        assert_eq!(cloud.log_id(), "agent");
        assert_eq!(cloud.resource().type_, Some(GCE_INSTANCE.to_string()));

        let labels = logger.cloud_labels().unwrap();
        assert_eq!(labels.get(MIG_NAME_LABEL), Some(&"pool".to_string()));
        assert_eq!(labels.get(MIG_ZONE_LABEL), Some(&"europe-west1-b".to_string()));
        logger.close().await.unwrap();
    }

    #[tokio::test]
    async fn debug_entries_follow_the_debug_flag() {
        let sink = RecordingSink::default();
        let cloud = RecordingCloud::default();
        let logger = Logger::init(opts(&sink, &cloud)).await.unwrap();

        logger.debug(format_args!("hidden"));
        logger.log(LogEntry::new(Severity::Debug, "hidden too"));
        assert!(sink.lines().is_empty());
        assert!(cloud.buffered().is_empty());

        logger.set_debug_logging(true);
        logger.debug(format_args!("shown"));
        assert_eq!(sink.lines().len(), 1);
        assert_eq!(cloud.buffered()[0].severity, CloudSeverity::Debug);
        logger.close().await.unwrap();
    }

    #[tokio::test]
    async fn entry_labels_win_over_common_labels() {
        let sink = RecordingSink::default();
        let cloud = RecordingCloud::default();
        let logger = Logger::init(
            opts(&sink, &cloud).with_mig("projects/p/zones/z/instanceGroupManagers/pool"),
        )
        .await
        .unwrap();

        logger.log(
            LogEntry::new(Severity::Warning, "m")
                .with_label(MIG_NAME_LABEL, "override")
                .with_label("extra", "x"),
        );

        let labels = &cloud.buffered()[0].labels;
        assert_eq!(labels.get(MIG_NAME_LABEL), Some(&"override".to_string()));
        assert_eq!(labels.get(MIG_ZONE_LABEL), Some(&"z".to_string()));
        assert_eq!(labels.get("extra"), Some(&"x".to_string()));
        logger.close().await.unwrap();
    }

    #[tokio::test]
    async fn structured_payload_replaces_default_payload() {
        let sink = RecordingSink::default();
        let cloud = RecordingCloud::default();
        let logger = Logger::init(opts(&sink, &cloud)).await.unwrap();

        logger.log(
            LogEntry::new(Severity::Error, "failed")
                .with_structured_payload(json!({ "code": 7, "reason": "quota" })),
        );

        assert_eq!(
            cloud.buffered()[0].payload,
            json!({ "code": 7, "reason": "quota" })
        );
        assert!(sink.lines()[0].1.ends_with(": failed"));
        logger.close().await.unwrap();
    }

    #[tokio::test]
    async fn errors_carry_their_call_site_locally() {
        let sink = RecordingSink::default();
        let logger = Logger::init(
            LogOpts::new("agent").with_local_sink(Box::new(sink.clone())),
        )
        .await
        .unwrap();

        let line = line!() + 1;
        logger.error(format_args!("disk full"));

        let expected = format!(" ERROR logger.rs:{}: disk full", line);
        assert!(sink.lines()[0].1.ends_with(&expected), "{}", sink.lines()[0].1);
        logger.close().await.unwrap();
    }

    #[tokio::test]
    async fn cloud_setup_failure_is_not_fatal() {
        let sink = RecordingSink::default();
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let logger = Logger::init(
            LogOpts::new("agent")
                .with_project("my-project")
                .with_local_sink(Box::new(sink.clone()))
                .with_writer(buffer.clone())
                .with_cloud_connector(Arc::new(FailingConnector::default())),
        )
        .await
        .unwrap();

        assert!(!logger.cloud_enabled());
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, Severity::Error);
        assert!(lines[0]
            .1
            .contains("Continuing without cloud logging due to error in initialization"));

        logger.info(format_args!("still logging"));
        assert_eq!(sink.lines().len(), 2);
        let output = written(&buffer);
        let written_lines: Vec<_> = output.lines().collect();
        assert_eq!(written_lines.len(), 2);
        assert!(written_lines[0].contains(" ERROR logger.rs:"), "{output}");
        assert!(written_lines[1].ends_with(" INFO: still logging"), "{output}");
        logger.close().await.unwrap();
    }

    #[tokio::test]
    async fn no_project_means_no_cloud() {
        let cloud = RecordingCloud::default();
        let logger = Logger::init(
            LogOpts::new("agent")
                .without_local_logging()
                .with_cloud_connector(Arc::new(cloud.clone())),
        )
        .await
        .unwrap();
        assert!(!logger.cloud_enabled());
        logger.info(format_args!("local only"));
        assert_eq!(cloud.project_id(), "");
        logger.close().await.unwrap();
    }

    #[tokio::test]
    async fn disabled_cloud_is_never_contacted() {
        let sink = RecordingSink::default();
        let cloud = RecordingCloud::default();
        let logger = Logger::init(opts(&sink, &cloud).without_cloud_logging())
            .await
            .unwrap();
        logger.info(format_args!("m"));
        assert!(!logger.cloud_enabled());
        assert!(cloud.buffered().is_empty());
        assert_eq!(cloud.project_id(), "");
        logger.close().await.unwrap();
    }

    #[tokio::test]
    async fn broken_sink_does_not_stop_the_others() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let logger = Logger::init(
            LogOpts::new("agent")
                .with_local_sink(Box::new(BrokenSink::default()))
                .with_writer(buffer.clone()),
        )
        .await
        .unwrap();
        logger.warning(format_args!("careful"));
        assert!(written(&buffer).ends_with(" WARNING: careful\n"));
        logger.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_flushes_and_releases_everything() {
        let sink = RecordingSink::default();
        let cloud = RecordingCloud::default();
        let logger = Logger::init(opts(&sink, &cloud)).await.unwrap();
        logger.info(format_args!("one"));
        logger.info(format_args!("two"));

        logger.close().await.unwrap();

        assert_eq!(cloud.flushed().len(), 2);
        assert_eq!(cloud.closes(), 1);
        assert_eq!(sink.closes(), 1);
        assert!(!logger.cloud_enabled());
    }

    #[tokio::test]
    async fn close_twice_is_a_no_op() {
        let sink = RecordingSink::default();
        let cloud = RecordingCloud::default();
        let logger = Logger::init(opts(&sink, &cloud)).await.unwrap();
        logger.close().await.unwrap();
        logger.close().await.unwrap();
        assert_eq!(cloud.closes(), 1);
        assert_eq!(sink.closes(), 1);
    }

    #[tokio::test]
    async fn unreachable_cloud_skips_the_flush() {
        let sink = RecordingSink::default();
        let cloud = RecordingCloud::default();
        let logger = Logger::init(opts(&sink, &cloud)).await.unwrap();
        logger.info(format_args!("lost"));
        cloud.set_unreachable(true);

        let err = logger.close().await.unwrap_err();

        match err {
            Error::Close(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(matches!(errors[0], Error::CloudUnreachable(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(cloud.flushed().is_empty());
        assert_eq!(cloud.closes(), 0);
        let lines = sink.lines();
        let (severity, line) = lines.last().unwrap();
        assert_eq!(*severity, Severity::Warning);
        assert!(line.contains("skipping flush: connection refused"), "{line}");
        assert_eq!(sink.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cloud_is_flushed_periodically() {
        let sink = RecordingSink::default();
        let cloud = RecordingCloud::default();
        let logger = Logger::init(opts(&sink, &cloud).with_flush_interval(Duration::from_secs(5)))
            .await
            .unwrap();
        logger.info(format_args!("tick"));
        assert_eq!(cloud.flushes(), 0);

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(cloud.flushes(), 1);
        assert_eq!(cloud.flushed().len(), 1);
        logger.close().await.unwrap();
    }

    #[tokio::test]
    async fn writers_are_flushed_on_close() {
        let buffer = Arc::new(Mutex::new(std::io::BufWriter::new(Vec::new())));
        let logger = Logger::init(
            LogOpts::new("agent")
                .without_local_logging()
                .with_writer(buffer.clone()),
        )
        .await
        .unwrap();
        logger.info(format_args!("buffered"));
        assert!(buffer.lock().unwrap().get_ref().is_empty());
        logger.close().await.unwrap();
        assert!(!buffer.lock().unwrap().get_ref().is_empty());
    }

    #[tokio::test]
    async fn fatal_hooks_run_in_registration_order() {
        let logger = Logger::init(LogOpts::new("agent").without_local_logging())
            .await
            .unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            logger.defer_fatal(move || order.lock().unwrap().push(i));
        }

        logger.run_fatal_hooks();
        logger.run_fatal_hooks();

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn close_does_not_wait_for_a_hanging_flush() {
        let logger = Logger::init(misbehaving(Misbehaviour::Hang)).await.unwrap();
        // The first periodic flush starts at 50ms and never finishes.
        tokio::time::sleep(Duration::from_millis(120)).await;

        let started = tokio::time::Instant::now();
        let result = tokio::time::timeout(Duration::from_secs(5), logger.close())
            .await
            .expect("close must be bounded by the close timeout");

        assert!(started.elapsed() < Duration::from_secs(1));
        match result {
            Err(Error::Close(errors)) => {
                assert!(matches!(errors.as_slice(), [Error::CloudUnreachable(_)]))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_flush_task_is_reported_on_close() {
        let logger = Logger::init(misbehaving(Misbehaviour::PanicOnce)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        match logger.close().await {
            Err(Error::Close(errors)) => {
                assert!(matches!(errors.as_slice(), [Error::FlushTask(_)]))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_logging_keeps_lines_whole() {
        const THREADS: usize = 8;
        const LINES: usize = 50;

        let sink = RecordingSink::default();
        let cloud = RecordingCloud::default();
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let logger = Logger::init(opts(&sink, &cloud).with_writer(buffer.clone()))
            .await
            .unwrap();

        std::thread::scope(|scope| {
            for thread in 0..THREADS {
                let logger = &logger;
                scope.spawn(move || {
                    for line in 0..LINES {
                        logger.info(format_args!("thread {} line {}", thread, line));
                    }
                });
            }
        });

        let expected: BTreeSet<String> = (0..THREADS)
            .flat_map(|thread| {
                (0..LINES).map(move |line| format!("thread {} line {}", thread, line))
            })
            .collect();
        let message = |line: &str| -> String {
            line.split(" INFO: ").nth(1).unwrap_or_default().to_string()
        };

        let output = written(&buffer);
        let from_writer: Vec<String> = output.lines().map(message).collect();
        assert_eq!(from_writer.len(), THREADS * LINES);
        assert_eq!(from_writer.into_iter().collect::<BTreeSet<_>>(), expected);

        let from_sink: Vec<String> = sink
            .lines()
            .iter()
            .map(|(_, line)| message(line.as_str()))
            .collect();
        assert_eq!(from_sink.len(), THREADS * LINES);
        assert_eq!(from_sink.into_iter().collect::<BTreeSet<_>>(), expected);

        assert_eq!(cloud.buffered().len(), THREADS * LINES);
        logger.close().await.unwrap();
    }
}
