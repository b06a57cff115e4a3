//! Client and application configuration.
//!
//! `ClientConfig` holds what the API client needs: the API root, the version
//! segment, timeouts and the refresh policy. The API root comes from
//! `CLICKEAT_API_URL` and falls back to the local development server.
//!
//! `AppConfig` is the small persisted application state, stored at
//! `~/.config/clickeat/config.json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
const APP_NAME: &str = "clickeat";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable holding the API root
pub const API_URL_ENV: &str = "CLICKEAT_API_URL";

/// Local development backend
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/";

pub const API_VERSION: &str = "v0";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Timeout for the token refresh call. Shorter than ordinary requests since a
/// user is waiting on the replay behind it.
const REFRESH_TIMEOUT_SECS: u64 = 5;

/// Delay between the session-expired notice and the redirect to login.
const REDIRECT_DELAY_MS: u64 = 1500;

/// How concurrent 401s share token refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// Every 401 refreshes on its own; the last write to the store wins.
    #[default]
    Independent,
    /// Refreshes are serialized, and a request whose token was already
    /// replaced by another refresh reuses the stored token.
    Coalesced,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// API root, always ending in `/` (e.g. `http://localhost:8000/api/`).
    pub api_url: String,
    pub version: String,
    pub timeout: Duration,
    pub refresh_timeout: Duration,
    pub redirect_delay: Duration,
    pub refresh_mode: RefreshMode,
}

impl ClientConfig {
    pub fn new(api_url: &str) -> Self {
        Self {
            api_url: normalize_api_url(api_url),
            version: API_VERSION.to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            refresh_timeout: Duration::from_secs(REFRESH_TIMEOUT_SECS),
            redirect_delay: Duration::from_millis(REDIRECT_DELAY_MS),
            refresh_mode: RefreshMode::default(),
        }
    }

    /// Resolve the API root from `CLICKEAT_API_URL`.
    pub fn from_env() -> Self {
        let api_url = std::env::var(API_URL_ENV).unwrap_or_default();
        Self::new(&api_url)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn with_redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay = delay;
        self
    }

    pub fn with_refresh_mode(mut self, mode: RefreshMode) -> Self {
        self.refresh_mode = mode;
        self
    }

    /// Versioned root every resource path is relative to.
    pub fn base_url(&self) -> String {
        format!("{}{}/", self.api_url, self.version.trim_matches('/'))
    }

    pub fn token_url(&self) -> String {
        format!("{}token/", self.api_url)
    }

    pub fn refresh_url(&self) -> String {
        format!("{}token/refresh/", self.api_url)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

/// Trim the configured value and guarantee a trailing slash; blank means the
/// development default. A trailing version segment is dropped since the
/// client appends `API_VERSION` itself.
fn normalize_api_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DEFAULT_API_URL.to_string();
    }
    let root = trimmed.trim_end_matches('/');
    let root = match root.rsplit_once('/') {
        Some((parent, last)) if last == API_VERSION => parent.trim_end_matches('/'),
        _ => root,
    };
    format!("{}/", root)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub last_email: Option<String>,
    /// Overrides `CLICKEAT_API_URL` when set.
    pub api_url: Option<String>,
    #[serde(default)]
    pub refresh_mode: RefreshMode,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Where the file-backed session store keeps `session.json`.
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Client configuration: env first, then the saved override on top.
    pub fn client_config(&self) -> ClientConfig {
        let config = match self.api_url.as_deref() {
            Some(url) => ClientConfig::new(url),
            None => ClientConfig::from_env(),
        };
        config.with_refresh_mode(self.refresh_mode)
    }
}
