//! Connects the cloud contract of the [`domain`](crate::domain::cloud) to Google Cloud Logging.

use crate::config;
use crate::domain::cloud::{
    CloudClient, CloudConnector, CloudEntry, CloudError, CloudErrorHook, CloudLogger,
};
use crate::resource::ResourceDescriptor;
use async_trait::async_trait;
use guestlog_google::{Client, ClientOptions, LoggerOptions};
use std::sync::Arc;

/// Creates [`Client`]s for Google Cloud Logging. Honours `GUESTLOG_LOGGING_ENDPOINT`,
/// `GUESTLOG_ACCESS_TOKEN` and `GCE_METADATA_HOST`.
#[derive(Debug, Default)]
pub struct GoogleCloudConnector {}

#[async_trait]
impl CloudConnector for GoogleCloudConnector {
    async fn connect(
        &self,
        project_id: &str,
        user_agent: Option<&str>,
    ) -> Result<Box<dyn CloudClient>, CloudError> {
        let mut options = ClientOptions::default()
            .with_endpoint(&config::LOGGING_ENDPOINT.val())
            .with_metadata_host(&config::METADATA_HOST.val());
        if let Some(token) = config::ACCESS_TOKEN.get() {
            options = options.with_access_token(&token);
        }
        if let Some(user_agent) = user_agent {
            options = options.with_user_agent(user_agent);
        }
        let client = Client::new(project_id, options)?;
        Ok(Box::new(GoogleCloudClient { client }))
    }
}

#[derive(Debug)]
struct GoogleCloudClient {
    client: Client,
}

#[async_trait]
impl CloudClient for GoogleCloudClient {
    fn set_on_error(&self, hook: CloudErrorHook) {
        self.client
            .set_on_error(Arc::new(move |e: &guestlog_google::Error| hook(e)));
    }

    fn logger(&self, log_id: &str, resource: &ResourceDescriptor) -> Arc<dyn CloudLogger> {
        let options = match &resource.type_ {
            Some(type_) => LoggerOptions::default().with_resource(type_, resource.labels.clone()),
            None => LoggerOptions::default(),
        };
        Arc::new(GoogleCloudLogger {
            logger: self.client.logger(log_id, options),
        })
    }

    async fn ping(&self) -> Result<(), CloudError> {
        Ok(self.client.ping().await?)
    }

    async fn close(&self) -> Result<(), CloudError> {
        self.client.close();
        Ok(())
    }
}

#[derive(Debug)]
struct GoogleCloudLogger {
    logger: guestlog_google::Logger,
}

#[async_trait]
impl CloudLogger for GoogleCloudLogger {
    fn log(&self, entry: CloudEntry) {
        self.logger.log(entry)
    }

    async fn flush(&self) -> Result<(), CloudError> {
        Ok(self.logger.flush().await?)
    }
}
