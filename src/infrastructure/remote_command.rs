use crate::domain::ports::{Command, CommandArgs};
use crate::infrastructure::core::http_client_factory::{HttpClientFactory, url_encode};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

/// Forwards a named command to a remote service at `{base_url}/commands/{name}`.
///
/// The arguments are POSTed as a JSON object and the JSON response body is returned as-is.
pub struct HttpCommand {
    name: String,
    endpoint: String,
    client: ClientWithMiddleware,
}

impl HttpCommand {
    pub fn new(name: impl Into<String>, base_url: &str, timeout: Duration) -> Self {
        let name = name.into();
        let endpoint = format!(
            "{}/commands/{}",
            base_url.trim_end_matches('/'),
            url_encode(&name)
        );
        Self {
            name,
            endpoint,
            client: HttpClientFactory::create_client(timeout),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Command for HttpCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Remote command"
    }

    async fn invoke(&self, args: &CommandArgs) -> Result<Value> {
        let body = serde_json::to_string(args).context("Failed to serialize command args")?;
        debug!("HttpCommand: POST {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .with_context(|| format!("Failed to call remote command {}", self.name))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(
                "HttpCommand: {} returned {}: {}",
                self.name, status, error_text
            );
            anyhow::bail!("Remote command {} failed ({}): {}", self.name, status, error_text);
        }

        response
            .json::<Value>()
            .await
            .with_context(|| format!("Failed to parse response of remote command {}", self.name))
    }
}
