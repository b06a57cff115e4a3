//! Core library for the ClickEat storefront and back-office.
//!
//! - `api`: the authenticated REST client with transparent access-token refresh
//! - `auth`: credential pair and the durable session stores
//! - `config`: client and application configuration
//! - `events`: user-facing notices and the redirect-to-login signal
//! - `models`: categories, dishes, staff and profile types

pub mod api;
pub mod auth;
pub mod config;
pub mod events;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{SessionStore, TokenPair};
pub use config::{AppConfig, ClientConfig, RefreshMode};
pub use events::{Notice, Resource, SessionEvent, SessionEvents};
