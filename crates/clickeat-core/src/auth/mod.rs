//! Authentication module for the session credential pair.
//!
//! This module provides:
//! - `TokenPair`: the access/refresh credential pair issued on login
//! - `SessionStore`: the durable key-value store the API client reads and
//!   mutates, with file, OS keychain and in-memory implementations
//!
//! The access token is replaced on every refresh; both tokens are destroyed
//! on logout or when a refresh fails.

pub mod session;
pub mod store;

pub use session::{SessionStore, StoreError, TokenPair, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
pub use store::{FileSessionStore, KeyringSessionStore, MemorySessionStore};
