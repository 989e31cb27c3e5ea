//! HTTP client for the Metabase REST API.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{MetabaseApi, Method};
use crate::config::MetabaseConfig;
use crate::error::{MikaError, Result};

/// Metabase REST client backed by reqwest.
///
/// Every request carries the configured API key header. GET requests use the
/// read timeout, POST and PUT the write timeout. Writes are never retried
/// because Metabase does not guarantee their idempotency.
#[derive(Debug, Clone)]
pub struct MetabaseClient {
    config: MetabaseConfig,
    client: Client,
}

impl MetabaseClient {
    /// Creates a new client with the given configuration.
    ///
    /// An unconfigured URL or API key is not an error here; each request
    /// fails with a configuration error instead.
    pub fn new(config: MetabaseConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .build()
            .map_err(|e| MikaError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Creates a client from `METABASE_URL` and `METABASE_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let mut config = MetabaseConfig::default();
        config.apply_env_defaults();
        Self::new(config)
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &MetabaseConfig {
        &self.config
    }

    /// Returns the base URL and API key, or a configuration error.
    fn credentials(&self) -> Result<(&str, &str)> {
        let base = self
            .config
            .base_url()
            .ok_or_else(|| MikaError::configuration("Metabase URL is not configured"))?;
        let key = self
            .config
            .api_key()
            .ok_or_else(|| MikaError::configuration("Metabase API key is not configured"))?;
        Ok((base, key))
    }

    fn timeout_for(&self, method: Method) -> Duration {
        if method.is_write() {
            self.config.write_timeout()
        } else {
            self.config.read_timeout()
        }
    }

    /// Maps a reqwest failure onto a transport error.
    fn transport_error(error: &reqwest::Error, timeout: Duration) -> MikaError {
        if error.is_timeout() {
            MikaError::transport(format!("Request timed out after {}s", timeout.as_secs()))
        } else if error.is_connect() {
            MikaError::transport(format!("Failed to connect to Metabase: {error}"))
        } else {
            MikaError::transport(format!("Request failed: {error}"))
        }
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let (base, key) = self.credentials()?;
        let url = format!("{base}{path}");
        let timeout = self.timeout_for(method);

        let mut request = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
        }
        .header(self.config.api_key_header.as_str(), key)
        .timeout(timeout);

        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(
            method = method.as_str(),
            path,
            key = %self.config.api_key_hint(),
            "Sending Metabase request"
        );

        let start = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| Self::transport_error(&e, timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Self::transport_error(&e, timeout))?;

        debug!(
            method = method.as_str(),
            path,
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis(),
            "Metabase response received"
        );

        if !status.is_success() {
            return Err(MikaError::remote(status.as_u16(), text));
        }

        parse_body(&text)
    }
}

/// Decodes a successful response body; an empty body becomes `null`.
fn parse_body(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text)
        .map_err(|e| MikaError::internal(format!("Failed to parse Metabase response: {e}")))
}

#[async_trait]
impl MetabaseApi for MetabaseClient {
    async fn get(&self, path: &str) -> Result<Value> {
        self.send(Method::Get, path, None).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::Post, path, Some(body)).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::Put, path, Some(body)).await
    }

    fn base_url(&self) -> Option<&str> {
        self.config.base_url()
    }
}
