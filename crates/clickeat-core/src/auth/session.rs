use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Credential pair issued by the token endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

// Keep tokens out of logs
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session file IO failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session file is corrupt: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Keychain access failed: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Session store lock poisoned")]
    Poisoned,
}

/// Durable, process-wide storage for the credential pair.
///
/// Implementations are shared between concurrent requests without any
/// transaction: when two refreshes race, whichever write lands last wins.
pub trait SessionStore: Send + Sync {
    fn access_token(&self) -> Result<Option<String>, StoreError>;

    fn refresh_token(&self) -> Result<Option<String>, StoreError>;

    /// Persist both tokens, replacing whatever was stored.
    fn save(&self, pair: &TokenPair) -> Result<(), StoreError>;

    /// Replace the access token, leaving the refresh token untouched.
    fn set_access_token(&self, token: &str) -> Result<(), StoreError>;

    /// Remove both tokens.
    fn clear(&self) -> Result<(), StoreError>;

    /// The full pair, if both halves are present.
    fn load(&self) -> Result<Option<TokenPair>, StoreError> {
        match (self.access_token()?, self.refresh_token()?) {
            (Some(access), Some(refresh)) => Ok(Some(TokenPair { access, refresh })),
            _ => Ok(None),
        }
    }

    /// A request counts as authenticated iff an access token is present.
    fn is_authenticated(&self) -> bool {
        matches!(self.access_token(), Ok(Some(_)))
    }
}
