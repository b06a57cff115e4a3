//! Credential issuance and refresh endpoints.
//!
//! These calls use their own `reqwest::Client` and never pass through the
//! interceptor pipeline, so a failing refresh can not trigger another refresh.

use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::transport::decode;
use super::ApiError;
use crate::auth::TokenPair;
use crate::config::ClientConfig;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct TokenEndpoints {
    client: Client,
    obtain_url: String,
    refresh_url: String,
    login_timeout: Duration,
    refresh_timeout: Duration,
}

impl TokenEndpoints {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("clickeat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to build token client: {}", e)))?;

        Ok(Self {
            client,
            obtain_url: config.token_url(),
            refresh_url: config.refresh_url(),
            login_timeout: config.timeout,
            refresh_timeout: config.refresh_timeout,
        })
    }

    /// Exchange email and password for a fresh credential pair.
    pub async fn obtain(&self, email: &str, password: &str) -> Result<TokenPair, ApiError> {
        self.post(
            &self.obtain_url,
            &LoginRequest { email, password },
            self.login_timeout,
        )
        .await
    }

    /// Mint a new access token. The refresh token itself is not rotated.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, ApiError> {
        let response: RefreshResponse = self
            .post(
                &self.refresh_url,
                &RefreshRequest {
                    refresh: refresh_token,
                },
                self.refresh_timeout,
            )
            .await?;
        Ok(response.access)
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let status = response.status();
        debug!(url = url, status = status.as_u16(), "Token endpoint responded");

        let bytes = response.bytes().await.map_err(ApiError::from_transport)?;
        if status.is_success() {
            decode(&bytes)
        } else {
            Err(ApiError::from_status(status, ApiError::decode_payload(&bytes)))
        }
    }
}
