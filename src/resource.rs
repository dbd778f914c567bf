//! Derives the monitored resource and the common labels of cloud-bound entries from the
//! environment the process runs in.

use crate::domain::metadata::MetadataProvider;
use regex::Regex;
use std::collections::HashMap;

/// Resource type of a plain Compute Engine instance.
pub const GCE_INSTANCE: &str = "gce_instance";

/// Resource type of a Kubernetes node.
pub const K8S_NODE: &str = "k8s_node";

/// The `gce_instance` resource has no name field, so the name travels as a common label.
pub const INSTANCE_NAME_LABEL: &str = "instance_name";

// Managed instance group labels.
pub const MIG_NAME_LABEL: &str = "compute.googleapis.com/instance_group_manager/name";
pub const MIG_ZONE_LABEL: &str = "compute.googleapis.com/instance_group_manager/zone";
pub const MIG_REGION_LABEL: &str = "compute.googleapis.com/instance_group_manager/region";

lazy_static! {
    static ref MIG_PATTERN: Regex =
        Regex::new(r"^projects/[^/]+/(zones|regions)/([^/]+)/instanceGroupManagers/([^/]+)$")
            .unwrap();
}

/// Identifies the host environment of every cloud-bound entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// `None` leaves the choice of the resource type to the backend.
    pub type_: Option<String>,
    pub labels: HashMap<String, String>,
}

impl ResourceDescriptor {
    pub fn is_resolved(&self) -> bool {
        self.type_.is_some()
    }
}

/// The outcome of [`resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub resource: ResourceDescriptor,
    /// Attached to every entry sent to the cloud.
    pub common_labels: HashMap<String, String>,
}

/// Where a managed instance group lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupLocation {
    Zone(String),
    Region(String),
}

/// A managed instance group, parsed from
/// `projects/<project>/(zones|regions)/<location>/instanceGroupManagers/<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceGroup {
    pub group_name: String,
    pub location: GroupLocation,
}

impl InstanceGroup {
    /// Returns `None` for empty or malformed input.
    pub fn parse(mig: &str) -> Option<Self> {
        let captures = MIG_PATTERN.captures(mig)?;
        let location = captures[2].to_string();
        let location = match &captures[1] {
            "zones" => GroupLocation::Zone(location),
            _ => GroupLocation::Region(location),
        };
        Some(InstanceGroup {
            group_name: captures[3].to_string(),
            location,
        })
    }

    /// The group as Cloud Logging labels.
    pub fn labels(&self) -> HashMap<String, String> {
        let location = match &self.location {
            GroupLocation::Zone(zone) => (MIG_ZONE_LABEL.to_string(), zone.clone()),
            GroupLocation::Region(region) => (MIG_REGION_LABEL.to_string(), region.clone()),
        };
        HashMap::from([
            (MIG_NAME_LABEL.to_string(), self.group_name.clone()),
            location,
        ])
    }
}

/// Parses a managed instance group identifier into labels. Anything that does not parse
/// yields no labels.
pub fn parse_mig_labels(mig: &str) -> HashMap<String, String> {
    InstanceGroup::parse(mig)
        .map(|group| group.labels())
        .unwrap_or_default()
}

/// Works out the monitored resource and the common labels. Only reads from `provider`, so
/// calling it twice with the same answers gives the same result.
pub async fn resolve(provider: &dyn MetadataProvider, mig: &str) -> Resolution {
    let mut resolution = Resolution::default();

    if provider.on_gke().await {
        resolution.resource = ResourceDescriptor {
            type_: Some(K8S_NODE.to_string()),
            labels: HashMap::from([
                ("cluster_name".to_string(), provider.cluster_name().await),
                ("location".to_string(), provider.zone().await),
                ("node_name".to_string(), provider.instance_name().await),
                ("project_id".to_string(), provider.project_id().await),
            ]),
        };
    } else if provider.on_gce().await {
        resolution.resource = ResourceDescriptor {
            type_: Some(GCE_INSTANCE.to_string()),
            labels: HashMap::from([
                ("instance_id".to_string(), provider.instance_id().await),
                ("project_id".to_string(), provider.project_id().await),
                ("zone".to_string(), provider.zone().await),
            ]),
        };
        let name = provider.instance_name().await;
        if !name.is_empty() {
            resolution
                .common_labels
                .insert(INSTANCE_NAME_LABEL.to_string(), name);
        }
    }

    resolution.common_labels.extend(parse_mig_labels(mig));
    resolution
}
