//! In-memory collaborators for tests of code that logs through a [`Logger`](crate::Logger).

use crate::domain::cloud::{
    CloudClient, CloudConnector, CloudEntry, CloudError, CloudErrorHook, CloudLogger,
};
use crate::domain::entry::Severity;
use crate::domain::local::LocalSink;
use crate::resource::ResourceDescriptor;
use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// A [`LocalSink`] that remembers what was written to it. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    lines: Arc<Mutex<Vec<(Severity, String)>>>,
    closes: Arc<AtomicUsize>,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<(Severity, String)> {
        lock(&self.lines).clone()
    }

    /// How often [`LocalSink::close`] was called.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl LocalSink for RecordingSink {
    fn write(&mut self, severity: Severity, line: &str) -> io::Result<()> {
        lock(&self.lines).push((severity, line.to_string()));
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A [`LocalSink`] whose writes always fail.
#[derive(Debug, Default)]
pub struct BrokenSink {}

impl LocalSink for BrokenSink {
    fn write(&mut self, _severity: Severity, _line: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink is broken"))
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CloudRecord {
    project_id: String,
    user_agent: Option<String>,
    log_id: String,
    resource: ResourceDescriptor,
    buffered: Vec<CloudEntry>,
    flushed: Vec<CloudEntry>,
}

/// A cloud backend that keeps everything in memory. It is at once the connector, the client
/// and the logger; clones share state.
#[derive(Debug, Clone, Default)]
pub struct RecordingCloud {
    record: Arc<Mutex<CloudRecord>>,
    unreachable: Arc<AtomicBool>,
    error_hook_installed: Arc<AtomicBool>,
    flushes: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl RecordingCloud {
    /// Makes [`CloudClient::ping`] fail.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn project_id(&self) -> String {
        lock(&self.record).project_id.clone()
    }

    pub fn user_agent(&self) -> Option<String> {
        lock(&self.record).user_agent.clone()
    }

    pub fn log_id(&self) -> String {
        lock(&self.record).log_id.clone()
    }

    pub fn resource(&self) -> ResourceDescriptor {
        lock(&self.record).resource.clone()
    }

    /// Entries logged but not flushed yet.
    pub fn buffered(&self) -> Vec<CloudEntry> {
        lock(&self.record).buffered.clone()
    }

    /// Entries that went out with a flush.
    pub fn flushed(&self) -> Vec<CloudEntry> {
        lock(&self.record).flushed.clone()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn error_hook_installed(&self) -> bool {
        self.error_hook_installed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CloudConnector for RecordingCloud {
    async fn connect(
        &self,
        project_id: &str,
        user_agent: Option<&str>,
    ) -> Result<Box<dyn CloudClient>, CloudError> {
        {
            let mut record = lock(&self.record);
            record.project_id = project_id.to_string();
            record.user_agent = user_agent.map(str::to_string);
        }
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl CloudClient for RecordingCloud {
    fn set_on_error(&self, _hook: CloudErrorHook) {
        self.error_hook_installed.store(true, Ordering::SeqCst);
    }

    fn logger(&self, log_id: &str, resource: &ResourceDescriptor) -> Arc<dyn CloudLogger> {
        {
            let mut record = lock(&self.record);
            record.log_id = log_id.to_string();
            record.resource = resource.clone();
        }
        Arc::new(self.clone())
    }

    async fn ping(&self) -> Result<(), CloudError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err("connection refused".into())
        } else {
            Ok(())
        }
    }

    async fn close(&self) -> Result<(), CloudError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl CloudLogger for RecordingCloud {
    fn log(&self, entry: CloudEntry) {
        lock(&self.record).buffered.push(entry);
    }

    async fn flush(&self) -> Result<(), CloudError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        let mut record = lock(&self.record);
        let entries = std::mem::take(&mut record.buffered);
        record.flushed.extend(entries);
        Ok(())
    }
}

/// A connector that can never connect.
#[derive(Debug, Default)]
pub struct FailingConnector {}

#[async_trait]
impl CloudConnector for FailingConnector {
    async fn connect(
        &self,
        _project_id: &str,
        _user_agent: Option<&str>,
    ) -> Result<Box<dyn CloudClient>, CloudError> {
        Err("could not find default credentials".into())
    }
}
