use crate::domain::ports::DownstreamTransport;
use crate::utils::error::{Result, SeederError};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    /// Per-attempt limit on the whole request/response exchange.
    pub read_timeout: Duration,
    pub max_idle_connections: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(5000),
            read_timeout: Duration::from_millis(30000),
            max_idle_connections: 200,
        }
    }
}

/// JSON-over-HTTP transport for one downstream service.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    service: String,
    base_url: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(
        service: impl Into<String>,
        base_url: impl Into<String>,
        settings: &HttpSettings,
    ) -> Result<Self> {
        let service = service.into();
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.read_timeout)
            .pool_max_idle_per_host(settings.max_idle_connections)
            .build()
            .map_err(|e| SeederError::Config {
                message: format!("cannot build HTTP client for {}: {}", service, e),
            })?;

        Ok(Self {
            service,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn transport_error(&self, operation: &str, error: reqwest::Error) -> SeederError {
        if error.is_timeout() {
            SeederError::DownstreamTimeout {
                service: self.service.clone(),
                operation: operation.to_string(),
            }
        } else {
            SeederError::DownstreamTransport {
                service: self.service.clone(),
                message: error.to_string(),
            }
        }
    }

    /// Reads the body as text; non-2xx statuses become `DownstreamRejected`.
    async fn read_body(&self, operation: &str, response: Response) -> Result<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(operation, e))?;

        if !status.is_success() {
            return Err(SeederError::DownstreamRejected {
                service: self.service.clone(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    /// An empty success body decodes to `Null`.
    async fn read_json(&self, operation: &str, response: Response) -> Result<Value> {
        let body = self.read_body(operation, response).await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl DownstreamTransport for HttpTransport {
    fn service(&self) -> &str {
        &self.service
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value> {
        let url = self.url(path);
        tracing::trace!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error("create", e))?;
        self.read_json("create", response).await
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = self.url(path);
        tracing::trace!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error("list", e))?;
        self.read_json("list", response).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        tracing::trace!("DELETE {}", url);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| self.transport_error("delete", e))?;
        // Services answer deletes with free text, only the status matters
        self.read_body("delete", response).await.map(|_| ())
    }
}
