//! API client for the ClickEat REST backend.
//!
//! `ApiClient` dispatches requests against `<API_URL>v0/` through the
//! interceptor pipeline. The default pipeline attaches the stored bearer
//! token, reports timeouts and refreshes the access token on a 401.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::interceptor::{BearerAuth, Interceptor, TimeoutNotice, Verdict};
use super::refresh::RefreshOnUnauthorized;
use super::request::{Attempt, FormPart, PendingRequest, RequestBody, RequestOptions};
use super::tokens::TokenEndpoints;
use super::transport::{decode, Transport};
use super::ApiError;
use crate::auth::{FileSessionStore, SessionStore, TokenPair};
use crate::config::{AppConfig, ClientConfig};
use crate::events::{Notice, Resource, SessionEvent, SessionEvents};

/// What a resource call was doing when it failed; picks the notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    Load,
    Save,
    Delete,
}

struct Inner {
    transport: Transport,
    tokens: TokenEndpoints,
    store: Arc<dyn SessionStore>,
    events: SessionEvents,
    pipeline: Vec<Arc<dyn Interceptor>>,
    config: ClientConfig,
}

/// Authenticated API client.
/// Clone is cheap - all state is shared behind an `Arc`.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ClientConfig>,
    store: Option<Arc<dyn SessionStore>>,
    events: Option<SessionEvents>,
    extra: Vec<Arc<dyn Interceptor>>,
}

impl ApiClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn events(mut self, events: SessionEvents) -> Self {
        self.events = Some(events);
        self
    }

    /// Append a stage after the default ones.
    pub fn interceptor(mut self, stage: Arc<dyn Interceptor>) -> Self {
        self.extra.push(stage);
        self
    }

    pub fn build(self) -> Result<ApiClient, ApiError> {
        let config = self.config.unwrap_or_else(ClientConfig::from_env);
        let store = match self.store {
            Some(store) => store,
            None => {
                let dir = AppConfig::data_dir().map_err(|e| ApiError::Config(e.to_string()))?;
                Arc::new(FileSessionStore::new(dir)) as Arc<dyn SessionStore>
            }
        };
        let events = self.events.unwrap_or_default();

        let transport = Transport::new(config.base_url(), config.timeout)?;
        let tokens = TokenEndpoints::new(&config)?;

        let mut pipeline: Vec<Arc<dyn Interceptor>> = vec![
            Arc::new(BearerAuth::new(store.clone())),
            Arc::new(TimeoutNotice::new(events.clone())),
            Arc::new(RefreshOnUnauthorized::new(
                tokens.clone(),
                store.clone(),
                events.clone(),
                config.redirect_delay,
                config.refresh_mode,
            )),
        ];
        pipeline.extend(self.extra);

        debug!(base_url = %config.base_url(), mode = ?config.refresh_mode, "API client ready");

        Ok(ApiClient {
            inner: Arc::new(Inner {
                transport,
                tokens,
                store,
                events,
                pipeline,
                config,
            }),
        })
    }
}

impl ApiClient {
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Exchange credentials for a token pair and store it. Goes straight to
    /// the token endpoint; a 401 here is a wrong password, never a refresh.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, ApiError> {
        let pair = self.inner.tokens.obtain(email, password).await?;
        self.inner.store.save(&pair)?;
        info!(email = email, "Logged in");
        self.inner.events.emit(SessionEvent::LoggedIn);
        Ok(pair)
    }

    /// Tell the backend to blacklist the refresh token, then forget the
    /// session whatever the outcome. The call is sent once, outside the
    /// pipeline: a dead session must not refresh or announce its expiry here.
    pub async fn logout(&self) -> Result<(), ApiError> {
        match self.inner.store.refresh_token() {
            Ok(Some(refresh)) => {
                if let Err(e) = self.send_logout(&refresh).await {
                    warn!(error = %e, "Logout request failed; clearing local session anyway");
                }
            }
            Ok(None) => debug!("No refresh token; skipping logout request"),
            Err(e) => warn!(error = %e, "Could not read refresh token for logout"),
        }

        self.inner.store.clear()?;
        info!("Logged out");
        self.inner.events.emit(SessionEvent::LoggedOut);
        Ok(())
    }

    async fn send_logout(&self, refresh: &str) -> Result<(), ApiError> {
        let body = RequestBody::json(&serde_json::json!({ "refresh": refresh }))?;
        let mut request = PendingRequest::new(Method::POST, "auth/logout/").with_body(body);
        if let Ok(Some(access)) = self.inner.store.access_token() {
            request.set_bearer(&access);
        }
        self.inner.transport.send(&request).await.map(|_| ())
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.store.is_authenticated()
    }

    pub fn events(&self) -> &SessionEvents {
        &self.inner.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.inner.store
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn base_url(&self) -> &str {
        self.inner.transport.base_url()
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Send a request relative to the versioned API root and decode the 2xx
    /// body as `T`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let request = PendingRequest::new(method, path)
            .with_body(body)
            .with_options(options);
        let bytes = self.dispatch(request).await?;
        decode(&bytes)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::GET, path, RequestBody::Empty, RequestOptions::default())
            .await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let options = query
            .iter()
            .fold(RequestOptions::default(), |options, (key, value)| {
                options.query(*key, value)
            });
        self.request(Method::GET, path, RequestBody::Empty, options)
            .await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(Method::POST, path, RequestBody::json(body)?, RequestOptions::default())
            .await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(Method::PATCH, path, RequestBody::json(body)?, RequestOptions::default())
            .await
    }

    /// DELETE, ignoring whatever body comes back.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.dispatch(PendingRequest::new(Method::DELETE, path))
            .await
            .map(|_| ())
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        parts: Vec<FormPart>,
    ) -> Result<T, ApiError> {
        self.request(Method::POST, path, RequestBody::Multipart(parts), RequestOptions::default())
            .await
    }

    pub async fn patch_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        parts: Vec<FormPart>,
    ) -> Result<T, ApiError> {
        self.request(Method::PATCH, path, RequestBody::Multipart(parts), RequestOptions::default())
            .await
    }

    /// Run the pipeline: pre-request stages, send, and on failure ask the
    /// post-response stages whether to replay.
    async fn dispatch(&self, mut request: PendingRequest) -> Result<Vec<u8>, ApiError> {
        let mut attempt = Attempt::FIRST;
        loop {
            for stage in &self.inner.pipeline {
                stage.on_request(&mut request, attempt);
            }

            let error = match self.inner.transport.send(&request).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };
            debug!(method = %request.method, path = %request.path, attempt = attempt.number(), error = %error, "Request failed");

            match self.intercept(&error, &request, attempt).await? {
                Some((replay, next)) => {
                    request = replay;
                    attempt = next;
                }
                None => return Err(error),
            }
        }
    }

    async fn intercept(
        &self,
        error: &ApiError,
        request: &PendingRequest,
        attempt: Attempt,
    ) -> Result<Option<(PendingRequest, Attempt)>, ApiError> {
        for stage in &self.inner.pipeline {
            match stage.on_failure(error, request, attempt).await? {
                Verdict::Pass => continue,
                Verdict::Replay {
                    request: replay,
                    attempt: next,
                } => {
                    if attempt.next() == Some(next) {
                        return Ok(Some((replay, next)));
                    }
                    warn!(attempt = attempt.number(), "Replay refused: request already retried");
                    return Ok(None);
                }
            }
        }
        Ok(None)
    }

    /// Emit the resource notice matching a failed call, then hand the result
    /// back unchanged. Session expiry already has its own notice.
    pub(crate) fn report<T>(
        &self,
        result: Result<T, ApiError>,
        resource: Resource,
        action: Action,
    ) -> Result<T, ApiError> {
        if let Err(err) = &result {
            if let Some(notice) = notice_for(err, resource, action) {
                self.inner.events.notice(notice);
            }
        }
        result
    }
}

fn notice_for(err: &ApiError, resource: Resource, action: Action) -> Option<Notice> {
    if err.is_session_expired() {
        return None;
    }
    let notice = match action {
        Action::Load => Notice::LoadFailed(resource),
        Action::Save => Notice::SaveFailed(resource),
        Action::Delete if err.status() == Some(StatusCode::NOT_FOUND) => Notice::NotFound(resource),
        Action::Delete => Notice::DeleteFailed(resource),
    };
    Some(notice)
}
