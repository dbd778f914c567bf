use async_trait::async_trait;
use std::fmt::Debug;

/// Answers "where am I running".
///
/// Every accessor returns an empty string when the answer is unknown or the lookup failed;
/// an empty string is never an error signal.
#[async_trait]
pub trait MetadataProvider: Send + Sync + Debug {
    /// Whether we run on a Compute Engine instance.
    async fn on_gce(&self) -> bool;

    /// Whether the instance is a Kubernetes (GKE) node.
    async fn on_gke(&self) -> bool;

    async fn instance_name(&self) -> String;

    async fn instance_id(&self) -> String;

    /// The zone short name, e.g. `europe-west1-b`.
    async fn zone(&self) -> String;

    async fn project_id(&self) -> String;

    async fn cluster_name(&self) -> String;
}

/// A [`MetadataProvider`] with fixed answers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedMetadataProvider {
    pub on_gce: bool,
    pub on_gke: bool,
    pub instance_name: String,
    pub instance_id: String,
    pub zone: String,
    pub project_id: String,
    pub cluster_name: String,
}

#[async_trait]
impl MetadataProvider for FixedMetadataProvider {
    async fn on_gce(&self) -> bool {
        self.on_gce
    }

    async fn on_gke(&self) -> bool {
        self.on_gke
    }

    async fn instance_name(&self) -> String {
        self.instance_name.clone()
    }

    async fn instance_id(&self) -> String {
        self.instance_id.clone()
    }

    async fn zone(&self) -> String {
        self.zone.clone()
    }

    async fn project_id(&self) -> String {
        self.project_id.clone()
    }

    async fn cluster_name(&self) -> String {
        self.cluster_name.clone()
    }
}
