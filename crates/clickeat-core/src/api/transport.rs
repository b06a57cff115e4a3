use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::request::{PendingRequest, RequestBody};
use super::ApiError;

/// Bare HTTP sender against the versioned API root. Knows nothing about
/// tokens; the interceptor pipeline in `ApiClient` wraps it.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub(crate) struct Transport {
    client: Client,
    base_url: String,
}

impl Transport {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("clickeat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send the request once. Returns the raw body of a 2xx response;
    /// any other status becomes the matching `ApiError`.
    pub async fn send(&self, request: &PendingRequest) -> Result<Vec<u8>, ApiError> {
        let url = self.url_for(&request.path);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(parts) => builder.multipart(RequestBody::to_form(parts)?),
        };

        let response = builder.send().await.map_err(ApiError::from_transport)?;
        let status = response.status();
        debug!(method = %request.method, url = %url, status = status.as_u16(), "Response received");

        let body = response.bytes().await.map_err(ApiError::from_transport)?;
        if status.is_success() {
            Ok(body.to_vec())
        } else {
            Err(ApiError::from_status(status, ApiError::decode_payload(&body)))
        }
    }
}

/// Decode a success body. An empty body (e.g. 204 No Content) decodes as JSON
/// `null`, so `()`, `Option<_>` and `Value` all accept it.
pub(crate) fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let body: &[u8] = if body.is_empty() { b"null" } else { body };
    serde_json::from_slice(body)
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response: {}", e)))
}
