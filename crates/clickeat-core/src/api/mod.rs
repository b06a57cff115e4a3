//! REST API client module for the ClickEat backend.
//!
//! This module provides the `ApiClient` for calling the versioned API root
//! (`<API_URL>v0/`). Every request runs through an interceptor pipeline that
//! attaches the bearer token, reports timeouts and, on a 401, refreshes the
//! access token and replays the request once.
//!
//! Token issuance and refresh go through `TokenEndpoints`, which bypasses
//! the pipeline entirely.

pub mod account;
pub mod client;
pub mod error;
pub mod interceptor;
pub mod menu;
pub mod refresh;
pub mod request;
pub mod staff;
pub mod tokens;
mod transport;

pub use client::{ApiClient, ApiClientBuilder};
pub use error::{ApiError, RefreshError};
pub use interceptor::{BearerAuth, Interceptor, TimeoutNotice, Verdict};
pub use refresh::RefreshOnUnauthorized;
pub use request::{Attempt, FormPart, PendingRequest, RequestBody, RequestOptions};
pub use tokens::TokenEndpoints;
