use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::auth::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - token may be expired")]
    Unauthorized { payload: Value },

    #[error("Bad request: {}", summarize(.payload))]
    BadRequest { payload: Value },

    #[error("Access denied: {}", summarize(.payload))]
    AccessDenied { payload: Value },

    #[error("Resource not found: {}", summarize(.payload))]
    NotFound { payload: Value },

    #[error("Server error {status}: {}", summarize(.payload))]
    ServerError { status: StatusCode, payload: Value },

    #[error("Unexpected status {status}: {}", summarize(.payload))]
    Status { status: StatusCode, payload: Value },

    #[error("Server did not respond in time")]
    Timeout,

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Session expired - please log in again")]
    SessionExpired(#[source] Box<RefreshError>),

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Why an access-token refresh could not produce a new token.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("No refresh token available")]
    MissingRefreshToken,

    /// A concurrent request already failed to refresh and ended the session.
    #[error("Session was already ended by another request")]
    SessionEnded,

    #[error("Refresh request failed: {0}")]
    Request(#[from] ApiError),

    #[error("Could not read or write the session: {0}")]
    Store(#[from] StoreError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

fn summarize(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        Value::Null => String::from("(empty body)"),
        other => ApiError::truncate_body(&other.to_string()),
    }
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Decode an error body: JSON when possible, otherwise the (truncated) raw text.
    pub(crate) fn decode_payload(body: &[u8]) -> Value {
        if body.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(body).unwrap_or_else(|_| {
            Value::String(Self::truncate_body(&String::from_utf8_lossy(body)))
        })
    }

    pub fn from_status(status: StatusCode, payload: Value) -> Self {
        match status.as_u16() {
            400 => ApiError::BadRequest { payload },
            401 => ApiError::Unauthorized { payload },
            403 => ApiError::AccessDenied { payload },
            404 => ApiError::NotFound { payload },
            500..=599 => ApiError::ServerError { status, payload },
            _ => ApiError::Status { status, payload },
        }
    }

    /// Classify a transport-level failure. Timeouts are kept distinct from
    /// every other network error.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(err)
        }
    }

    /// HTTP status of the failed response, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            ApiError::BadRequest { .. } => Some(StatusCode::BAD_REQUEST),
            ApiError::AccessDenied { .. } => Some(StatusCode::FORBIDDEN),
            ApiError::NotFound { .. } => Some(StatusCode::NOT_FOUND),
            ApiError::ServerError { status, .. } | ApiError::Status { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Decoded error body returned by the server.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            ApiError::Unauthorized { payload }
            | ApiError::BadRequest { payload }
            | ApiError::AccessDenied { payload }
            | ApiError::NotFound { payload }
            | ApiError::ServerError { payload, .. }
            | ApiError::Status { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// True when the request was aborted client-side for exceeding its timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired(_))
    }

    /// Flatten a field-level validation payload (`{"field": ["message", ...]}`)
    /// into `(field, first message)` pairs for form binding.
    pub fn field_errors(&self) -> Vec<(String, String)> {
        let Some(Value::Object(fields)) = self.payload() else {
            return Vec::new();
        };
        if !matches!(self, ApiError::BadRequest { .. }) {
            return Vec::new();
        }

        fields
            .iter()
            .filter_map(|(field, messages)| {
                let message = match messages {
                    Value::Array(items) => items.first().map(|m| match m {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })?,
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((field.clone(), message))
            })
            .collect()
    }
}
