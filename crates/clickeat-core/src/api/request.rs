//! Owned, replayable request descriptors.
//!
//! A `PendingRequest` captures everything needed to dispatch a call again:
//! method, path, query, headers and body. Multipart bodies are kept as owned
//! parts and turned into a fresh `reqwest::multipart::Form` on every send,
//! since a form can only be consumed once.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::ApiError;

/// Which dispatch of a request this is. The original send is `Attempt::FIRST`;
/// a request is replayed at most once, so `Attempt::FIRST.next()` is the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Attempt(u8);

impl Attempt {
    pub const FIRST: Attempt = Attempt(1);

    /// Original dispatch plus one replay.
    pub const MAX: u8 = 2;

    pub fn next(self) -> Option<Attempt> {
        if self.0 < Self::MAX {
            Some(Attempt(self.0 + 1))
        } else {
            None
        }
    }

    pub fn is_first(self) -> bool {
        self == Self::FIRST
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

/// One field of a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormPart::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Vec<FormPart>),
}

impl RequestBody {
    pub fn json<B: Serialize + ?Sized>(body: &B) -> Result<Self, ApiError> {
        serde_json::to_value(body)
            .map(RequestBody::Json)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))
    }

    /// Build a fresh multipart form from the owned parts.
    pub(crate) fn to_form(parts: &[FormPart]) -> Result<reqwest::multipart::Form, ApiError> {
        let mut form = reqwest::multipart::Form::new();
        for part in parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                FormPart::File {
                    name,
                    file_name,
                    mime,
                    bytes,
                } => {
                    let mut file = reqwest::multipart::Part::bytes(bytes.clone())
                        .file_name(file_name.clone());
                    if let Some(mime) = mime {
                        file = file
                            .mime_str(mime)
                            .map_err(|e| ApiError::InvalidRequest(format!("Bad mime type {}: {}", mime, e)))?;
                    }
                    form.part(name.clone(), file)
                }
            };
        }
        Ok(form)
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Overrides the client's default timeout for this call.
    pub timeout: Option<Duration>,
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: Method,
    /// Relative to the versioned API root.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub timeout: Option<Duration>,
}

impl PendingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.timeout = options.timeout;
        self.query.extend(options.query);
        self
    }

    /// The bearer token this request currently carries, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }

    pub fn has_authorization(&self) -> bool {
        self.headers.contains_key(AUTHORIZATION)
    }

    /// Set `Authorization: Bearer <token>`. Tokens that are not valid header
    /// values are skipped and reported as `false`.
    pub fn set_bearer(&mut self, token: &str) -> bool {
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.headers.insert(AUTHORIZATION, value);
                true
            }
            Err(_) => false,
        }
    }

    /// Plan the replay of a request that failed on `attempt`: a copy carrying
    /// the new bearer token, paired with the next attempt number. `None` once
    /// the request has used up its single replay.
    pub fn replay_with_token(&self, attempt: Attempt, token: &str) -> Option<(PendingRequest, Attempt)> {
        let next = attempt.next()?;
        let mut replay = self.clone();
        if !replay.set_bearer(token) {
            return None;
        }
        Some((replay, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attempt_allows_single_replay() {
        let first = Attempt::FIRST;
        assert!(first.is_first());
        assert_eq!(first.number(), 1);

        let second = first.next().expect("first attempt can be replayed");
        assert!(!second.is_first());
        assert_eq!(second.number(), 2);
        assert_eq!(second.next(), None);
    }

    #[test]
    fn test_replay_with_token_updates_header_only_on_copy() {
        let mut original = PendingRequest::new(Method::GET, "dishes/")
            .with_options(RequestOptions::default().query("category_id", 3));
        original.set_bearer("A1");

        let (replay, attempt) = original
            .replay_with_token(Attempt::FIRST, "A2")
            .expect("replay planned");

        assert_eq!(attempt.number(), 2);
        assert_eq!(replay.bearer_token(), Some("A2"));
        assert_eq!(replay.query, vec![("category_id".to_string(), "3".to_string())]);
        assert_eq!(replay.method, Method::GET);
        assert_eq!(replay.path, "dishes/");
        // The descriptor that failed is left untouched
        assert_eq!(original.bearer_token(), Some("A1"));
    }

    #[test]
    fn test_replay_refused_after_retry() {
        let request = PendingRequest::new(Method::GET, "categories/");
        let second = Attempt::FIRST.next().unwrap();
        assert!(request.replay_with_token(second, "A2").is_none());
    }

    #[test]
    fn test_replay_keeps_body() {
        let request = PendingRequest::new(Method::POST, "categories/")
            .with_body(RequestBody::json(&json!({"name": "Pizza"})).unwrap());
        let (replay, _) = request.replay_with_token(Attempt::FIRST, "A2").unwrap();
        assert_eq!(replay.body, RequestBody::Json(json!({"name": "Pizza"})));
    }

    #[test]
    fn test_invalid_token_is_not_attached() {
        let mut request = PendingRequest::new(Method::GET, "categories/");
        assert!(!request.set_bearer("bad\ntoken"));
        assert!(!request.has_authorization());
    }

    #[test]
    fn test_request_options_builder() {
        let options = RequestOptions::default()
            .timeout(Duration::from_secs(2))
            .query("category_id", 7);
        let request = PendingRequest::new(Method::GET, "dishes/").with_options(options);
        assert_eq!(request.timeout, Some(Duration::from_secs(2)));
        assert_eq!(request.query.len(), 1);
    }

    #[test]
    fn test_to_form_accepts_text_and_file_parts() {
        let parts = vec![
            FormPart::text("name", "Margherita"),
            FormPart::File {
                name: "photo".into(),
                file_name: "pizza.png".into(),
                mime: Some("image/png".into()),
                bytes: vec![0x89, 0x50, 0x4e, 0x47],
            },
        ];
        assert!(RequestBody::to_form(&parts).is_ok());
        assert_eq!(parts[1].name(), "photo");
    }
}
