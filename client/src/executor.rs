//! Replaying queued requests against the REST API.

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use pitstop_engine::{HttpMethod, QueuedRequest};
use serde_json::Value;
use std::time::Duration;

/// Sends one queued request. Any `Err` counts as a failed replay.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, request: &QueuedRequest) -> Result<Value>;
}

/// [`RequestExecutor`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpExecutor {
    /// Create an executor for `base_url` with a per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            auth_token,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(
            config.api_url.clone(),
            config.auth_token.clone(),
            config.request_timeout,
        )
    }

    /// Absolute URL for a queued endpoint.
    pub fn url_for(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

fn to_reqwest(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(&self, request: &QueuedRequest) -> Result<Value> {
        let url = self.url_for(&request.endpoint);
        let mut builder = self
            .client
            .request(to_reqwest(request.method), &url)
            .header("X-Request-Id", request.id.as_str());

        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.ok().filter(|b| !b.is_empty());
            return Err(Error::Status {
                method: request.method.to_string(),
                endpoint: request.endpoint.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}
