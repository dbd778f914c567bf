//! This module answers [`MetadataProvider`] questions from the
//! [GCE metadata server](https://cloud.google.com/compute/docs/metadata/overview).
//!
use crate::config;
use crate::domain::metadata::MetadataProvider;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;

// See https://github.com/mechiru/gcemeta/blob/master/src/metadata.rs

// Documented metadata server IP address.
const METADATA_IP: &str = "169.254.169.254";

const METADATA_FLAVOR: &str = "Metadata-Flavor";

// `guestlog v{package_version}`
const USER_AGENT: &str = concat!("guestlog v", env!("BUILD_VERSION"));

// Off GCE the metadata host does not resolve or does not answer; don't hang Init on it.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Defines the errors that can be encountered when querying the metadata server.
#[derive(Error, Debug)]
pub enum Error {
    /// Something went wrong with the HTTP request
    #[error("request error: {0}: {1:?}")]
    Request(
        String,
        #[source] Box<dyn std::error::Error + Send + Sync + 'static>,
    ),

    /// The requested key is not defined for this instance
    #[error("metadata key not defined")]
    NotDefined,

    /// An unexpected HTTP status code was returned
    #[error("unexpected HTTP result code {0}")]
    UnexpectedHttpResult(StatusCode),
}

/// The live [`MetadataProvider`]. Failed lookups answer with an empty string.
#[derive(Debug)]
pub struct GceMetadataProvider {
    client: reqwest::Client,
    host: String,
    host_overridden: bool,
    on_gce: OnceCell<bool>,
}

impl Default for GceMetadataProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GceMetadataProvider {
    /// Uses the host in `GCE_METADATA_HOST`, or `metadata.google.internal`.
    pub fn new() -> Self {
        let mut provider = Self::with_host(config::METADATA_HOST.val());
        provider.host_overridden = config::METADATA_HOST.provided();
        provider
    }

    /// Uses the given metadata host. An explicit host counts as being on GCE.
    pub fn with_host<Str: Into<String>>(host: Str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        GceMetadataProvider {
            client,
            host: host.into(),
            host_overridden: true,
            on_gce: OnceCell::new(),
        }
    }

    // Does same as curl -s -HMetadata-Flavor:Google http://metadata.google.internal/computeMetadata/v1/<suffix>
    async fn get(&self, suffix: &str) -> Result<String, Error> {
        let uri = format!("http://{}/computeMetadata/v1/{}", self.host, suffix);
        let response = self
            .client
            .get(uri)
            .header(METADATA_FLAVOR, "Google")
            .send()
            .await
            .map_err(|e| Error::Request("error sending request".to_owned(), Box::new(e)))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(Error::NotDefined),
            code => return Err(Error::UnexpectedHttpResult(code)),
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Request("error getting response body".to_owned(), Box::new(e)))?;
        Ok(body.trim().to_string())
    }

    async fn value(&self, suffix: &str) -> String {
        self.get(suffix).await.unwrap_or_default()
    }

    // A metadata server identifies itself with a `Metadata-Flavor: Google` response header.
    async fn answers_as_google(&self, host: &str) -> bool {
        match self
            .client
            .get(format!("http://{}", host))
            .header(METADATA_FLAVOR, "Google")
            .send()
            .await
        {
            Ok(response) => response
                .headers()
                .get(METADATA_FLAVOR)
                .map(|v| v.as_bytes() == b"Google")
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn detect(&self) -> bool {
        if self.host_overridden {
            return true;
        }
        let (by_ip, by_name) = tokio::join!(
            self.answers_as_google(METADATA_IP),
            self.answers_as_google(&self.host)
        );
        by_ip || by_name
    }
}

// The zone comes back as `projects/<project-number>/zones/<zone>`.
fn zone_short_name(zone: &str) -> &str {
    zone.rsplit('/').next().unwrap_or(zone)
}

#[async_trait]
impl MetadataProvider for GceMetadataProvider {
    async fn on_gce(&self) -> bool {
        *self.on_gce.get_or_init(|| self.detect()).await
    }

    async fn on_gke(&self) -> bool {
        !self.cluster_name().await.is_empty()
    }

    async fn instance_name(&self) -> String {
        self.value("instance/name").await
    }

    async fn instance_id(&self) -> String {
        self.value("instance/id").await
    }

    async fn zone(&self) -> String {
        zone_short_name(&self.value("instance/zone").await).to_string()
    }

    async fn project_id(&self) -> String {
        self.value("project/project-id").await
    }

    async fn cluster_name(&self) -> String {
        self.value("instance/attributes/cluster-name").await
    }
}
