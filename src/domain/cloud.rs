//! The contract of the cloud logging backend.
//!
//! The backend buffers entries and uploads them on its own; the [`Logger`](crate::Logger)
//! only hands entries over and asks for flushes.

use crate::resource::ResourceDescriptor;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

pub use guestlog_google::{
    Entry as CloudEntry, Severity as CloudSeverity, SourceLocation as CloudSourceLocation,
};

/// Errors reported by cloud collaborators.
pub type CloudError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Called with errors that happen while uploading in the background.
pub type CloudErrorHook = Arc<dyn Fn(&(dyn std::error::Error + 'static)) + Send + Sync>;

/// Creates [`CloudClient`]s.
#[async_trait]
pub trait CloudConnector: Send + Sync + Debug {
    async fn connect(
        &self,
        project_id: &str,
        user_agent: Option<&str>,
    ) -> Result<Box<dyn CloudClient>, CloudError>;
}

/// A connection to the cloud logging backend of one project.
#[async_trait]
pub trait CloudClient: Send + Sync + Debug {
    /// Installs the hook that receives background upload errors.
    fn set_on_error(&self, hook: CloudErrorHook);

    /// Creates a buffered logger for the log `log_id`, attaching `resource` to its entries.
    fn logger(&self, log_id: &str, resource: &ResourceDescriptor) -> Arc<dyn CloudLogger>;

    /// Checks that the backend is reachable. Callers bound it with a timeout.
    async fn ping(&self) -> Result<(), CloudError>;

    async fn close(&self) -> Result<(), CloudError>;
}

/// A buffered writer for one log.
#[async_trait]
pub trait CloudLogger: Send + Sync + Debug {
    /// Buffers an entry; must not block on the network.
    fn log(&self, entry: CloudEntry);

    async fn flush(&self) -> Result<(), CloudError>;
}
