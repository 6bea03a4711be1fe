//! Deferred network requests.

use crate::{now_millis, RequestId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// HTTP method of a deferred request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(crate::Error::InvalidPayload(format!(
                "unknown http method: {other}"
            ))),
        }
    }
}

/// A network call deferred until connectivity allows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedRequest {
    /// Unique request ID
    pub id: RequestId,
    /// HTTP method
    pub method: HttpMethod,
    /// Endpoint path, relative to the API base URL
    pub endpoint: String,
    /// JSON body, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// When the request was queued (milliseconds since epoch)
    pub created_at: Timestamp,
    /// Number of failed replay attempts so far
    #[serde(default)]
    pub retry_count: u32,
}

impl QueuedRequest {
    /// Create a request stamped with a fresh id and the current time.
    pub fn new(
        method: HttpMethod,
        endpoint: impl Into<String>,
        body: Option<serde_json::Value>,
    ) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), method, endpoint, body, now_millis())
    }

    /// Create a request with explicit id and timestamp.
    pub fn with_id(
        id: impl Into<RequestId>,
        method: HttpMethod,
        endpoint: impl Into<String>,
        body: Option<serde_json::Value>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            method,
            endpoint: endpoint.into(),
            body,
            created_at,
            retry_count: 0,
        }
    }
}
