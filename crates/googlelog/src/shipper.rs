use google_logging2::api::WriteLogEntriesRequest;

use chrono::{DateTime, TimeDelta, Utc};

use reqwest::{Client, Response};

use tokio::sync::Mutex;

use crate::error::Error;

/// Path of the Cloud Logging write API, relative to the service endpoint.
const WRITE_PATH: &str = "/v2/entries:write";

/// Token caching
#[derive(Default)]
struct Token {
    token: Option<String>,
    renew_after: DateTime<Utc>,
}

async fn get_error_response(response: Response, context: String) -> Error {
    let status = response.status();

    let body = match response.bytes().await {
        Ok(bytes) => match serde_json::from_slice::<String>(&bytes) {
            Ok(json) => json,
            Err(_) => String::from_utf8_lossy(&bytes).to_string(),
        },
        Err(e) => format!("could not decode body of HTTP Error response: {e}"),
    };

    Error::Status {
        context,
        status,
        body,
    }
}

impl Token {
    fn renew_after_from_expires_in(expires_in: u64) -> DateTime<Utc> {
        let renew_after = TimeDelta::seconds(expires_in.saturating_sub(60) as i64);
        Utc::now() + renew_after
    }

    async fn fetch_access_token(
        &mut self,
        client: &Client,
        metadata_host: &str,
    ) -> Result<String, Error> {
        if let Some(token) = &self.token {
            if Utc::now() < self.renew_after {
                return Ok(token.clone());
            }
        }

        let url = format!(
            "http://{}/computeMetadata/v1/instance/service-accounts/default/token",
            metadata_host
        );
        let response = client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| Error::Request {
                context: "fetching an access token from the metadata server".to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(get_error_response(response, "fetching an access token".to_string()).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Request {
                context: "reading the access token response".to_string(),
                source: e,
            })?;
        let token_data: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| Error::Json {
                context: "decoding the access token response".to_string(),
                source: e,
            })?;
        let token_str = token_data["access_token"]
            .as_str()
            .ok_or(Error::MissingAccessToken)?
            .to_string();
        let expires_in = token_data["expires_in"]
            .as_u64()
            .ok_or(Error::MissingTokenExpiry)?;
        self.token = Some(token_str.clone());
        self.renew_after = Self::renew_after_from_expires_in(expires_in);
        Ok(token_str)
    }
}

/// Where access tokens come from.
pub(crate) enum Credentials {
    /// A fixed bearer token, e.g. for an emulator.
    Static(String),
    /// Tokens obtained from the metadata server of the instance we run on.
    Metadata { host: String },
}

/// Sends write requests to the Google Logging API
pub(crate) struct Shipper {
    client: Client,
    endpoint: String,
    credentials: Credentials,
    token: Mutex<Token>,
}

impl Shipper {
    pub(crate) fn new(client: Client, endpoint: String, credentials: Credentials) -> Self {
        Shipper {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credentials,
            token: Mutex::new(Token::default()),
        }
    }

    async fn access_token(&self) -> Result<String, Error> {
        match &self.credentials {
            Credentials::Static(token) => Ok(token.clone()),
            Credentials::Metadata { host } => {
                self.token
                    .lock()
                    .await
                    .fetch_access_token(&self.client, host)
                    .await
            }
        }
    }

    /// Performs one `entries:write` call.
    pub(crate) async fn write(&self, body: &WriteLogEntriesRequest) -> Result<(), Error> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.endpoint, WRITE_PATH);

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Request {
                context: "writing log entries".to_string(),
                source: e,
            })?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(get_error_response(
                response,
                "writing log entries".to_string(),
            )
            .await)
        }
    }
}
