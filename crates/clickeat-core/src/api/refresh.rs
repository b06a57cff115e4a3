//! Access-token refresh on 401.
//!
//! A request that comes back 401 on its first attempt triggers one call to
//! the refresh endpoint. On success the new access token is stored and the
//! request is replayed carrying it; on failure the session is torn down and
//! the caller gets `ApiError::SessionExpired`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::RefreshError;
use super::interceptor::{Interceptor, Verdict};
use super::request::{Attempt, PendingRequest};
use super::tokens::TokenEndpoints;
use super::ApiError;
use crate::auth::SessionStore;
use crate::config::RefreshMode;
use crate::events::{Notice, SessionEvents};

pub struct RefreshOnUnauthorized {
    tokens: TokenEndpoints,
    store: Arc<dyn SessionStore>,
    events: SessionEvents,
    redirect_delay: Duration,
    mode: RefreshMode,
    /// Held across the refresh call and any teardown in
    /// `RefreshMode::Coalesced`.
    gate: Mutex<()>,
}

impl RefreshOnUnauthorized {
    pub fn new(
        tokens: TokenEndpoints,
        store: Arc<dyn SessionStore>,
        events: SessionEvents,
        redirect_delay: Duration,
        mode: RefreshMode,
    ) -> Self {
        Self {
            tokens,
            store,
            events,
            redirect_delay,
            mode,
            gate: Mutex::new(()),
        }
    }

    /// Obtain the access token the replay should carry. Any failure has
    /// already torn the session down by the time it is returned.
    async fn renew(&self, failed: &PendingRequest) -> Result<String, ApiError> {
        match self.mode {
            RefreshMode::Independent => self.refresh().await.map_err(|e| self.tear_down(e)),
            RefreshMode::Coalesced => {
                // Held through teardown so waiters see the cleared store
                let _guard = self.gate.lock().await;
                if let Some(carried) = failed.bearer_token() {
                    match self.store.access_token() {
                        Ok(Some(current)) if current != carried => {
                            debug!("Reusing access token refreshed by a concurrent request");
                            return Ok(current);
                        }
                        Ok(None) => {
                            debug!("Session already ended by a concurrent request");
                            return Err(ApiError::SessionExpired(Box::new(
                                RefreshError::SessionEnded,
                            )));
                        }
                        Ok(Some(_)) => {}
                        Err(e) => return Err(self.tear_down(e.into())),
                    }
                }
                self.refresh().await.map_err(|e| self.tear_down(e))
            }
        }
    }

    async fn refresh(&self) -> Result<String, RefreshError> {
        let refresh_token = self
            .store
            .refresh_token()?
            .ok_or(RefreshError::MissingRefreshToken)?;

        let access = self.tokens.refresh(&refresh_token).await?;
        self.store.set_access_token(&access)?;
        info!("Access token refreshed");
        Ok(access)
    }

    /// Terminal failure: forget the credentials and send the user to login.
    fn tear_down(&self, reason: RefreshError) -> ApiError {
        warn!(error = %reason, "Token refresh failed; ending session");
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear session after refresh failure");
        }
        self.events.notice(Notice::SessionExpired);
        self.events.schedule_redirect(self.redirect_delay);
        ApiError::SessionExpired(Box::new(reason))
    }
}

#[async_trait]
impl Interceptor for RefreshOnUnauthorized {
    async fn on_failure(
        &self,
        error: &ApiError,
        request: &PendingRequest,
        attempt: Attempt,
    ) -> Result<Verdict, ApiError> {
        if !error.is_unauthorized() || !attempt.is_first() {
            return Ok(Verdict::Pass);
        }
        debug!(method = %request.method, path = %request.path, "401 received; refreshing access token");

        let token = self.renew(request).await?;

        match request.replay_with_token(attempt, &token) {
            Some((request, attempt)) => Ok(Verdict::Replay { request, attempt }),
            None => {
                warn!("Refreshed access token is not a valid header value");
                Ok(Verdict::Pass)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemorySessionStore, TokenPair};
    use crate::config::ClientConfig;
    use crate::events::SessionEvent;
    use reqwest::{Method, StatusCode};
    use serde_json::Value;

    fn stage(store: Arc<dyn SessionStore>, events: SessionEvents) -> RefreshOnUnauthorized {
        // Port 9 (discard) is never contacted by these tests
        let config = ClientConfig::new("http://127.0.0.1:9/api/");
        RefreshOnUnauthorized::new(
            TokenEndpoints::new(&config).unwrap(),
            store,
            events,
            Duration::from_millis(1),
            RefreshMode::Independent,
        )
    }

    fn unauthorized() -> ApiError {
        ApiError::from_status(StatusCode::UNAUTHORIZED, Value::Null)
    }

    #[tokio::test]
    async fn test_non_401_passes() {
        let store = Arc::new(MemorySessionStore::with_pair(TokenPair::new("A1", "R1")));
        let stage = stage(store.clone(), SessionEvents::new());
        let request = PendingRequest::new(Method::GET, "dishes/");
        let error = ApiError::from_status(StatusCode::FORBIDDEN, Value::Null);

        let verdict = stage.on_failure(&error, &request, Attempt::FIRST).await.unwrap();
        assert!(matches!(verdict, Verdict::Pass));
        assert_eq!(store.access_token().unwrap().as_deref(), Some("A1"));
    }

    #[tokio::test]
    async fn test_401_on_replay_passes() {
        let store = Arc::new(MemorySessionStore::with_pair(TokenPair::new("A1", "R1")));
        let stage = stage(store.clone(), SessionEvents::new());
        let request = PendingRequest::new(Method::GET, "dishes/");
        let second = Attempt::FIRST.next().unwrap();

        let verdict = stage.on_failure(&unauthorized(), &request, second).await.unwrap();
        assert!(matches!(verdict, Verdict::Pass));
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn test_missing_refresh_token_tears_down_session() {
        let store = Arc::new(MemorySessionStore::with_access_only("A1"));
        let events = SessionEvents::new();
        let mut rx = events.subscribe();
        let stage = stage(store.clone(), events);
        let request = PendingRequest::new(Method::GET, "dishes/");

        let err = stage
            .on_failure(&unauthorized(), &request, Attempt::FIRST)
            .await
            .unwrap_err();

        match err {
            ApiError::SessionExpired(reason) => {
                assert!(matches!(*reason, RefreshError::MissingRefreshToken))
            }
            other => panic!("expected SessionExpired, got {:?}", other),
        }
        assert!(!store.is_authenticated());
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::Notice(Notice::SessionExpired)
        );
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::RedirectToLogin);
    }

    fn coalesced(store: Arc<dyn SessionStore>, events: SessionEvents, url: &str) -> RefreshOnUnauthorized {
        let config = ClientConfig::new(url);
        RefreshOnUnauthorized::new(
            TokenEndpoints::new(&config).unwrap(),
            store,
            events,
            Duration::from_millis(1),
            RefreshMode::Coalesced,
        )
    }

    #[tokio::test]
    async fn test_coalesced_does_not_tear_down_twice() {
        // Store already cleared by the request that refreshed first
        let store = Arc::new(MemorySessionStore::new());
        let events = SessionEvents::new();
        let mut rx = events.subscribe();
        let stage = coalesced(store, events, "http://127.0.0.1:9/api/");
        let mut request = PendingRequest::new(Method::GET, "dishes/");
        request.set_bearer("A1");

        let err = stage
            .on_failure(&unauthorized(), &request, Attempt::FIRST)
            .await
            .unwrap_err();
        match err {
            ApiError::SessionExpired(reason) => {
                assert!(matches!(*reason, RefreshError::SessionEnded))
            }
            other => panic!("expected SessionExpired, got {:?}", other),
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unreachable_refresh_endpoint_tears_down_session() {
        // Bind then drop to get a port nothing listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let store = Arc::new(MemorySessionStore::with_pair(TokenPair::new("A1", "R1")));
        let events = SessionEvents::new();
        let mut rx = events.subscribe();
        let config = ClientConfig::new(&format!("http://127.0.0.1:{}/api/", port));
        let stage = RefreshOnUnauthorized::new(
            TokenEndpoints::new(&config).unwrap(),
            store.clone(),
            events,
            Duration::from_millis(1),
            RefreshMode::Independent,
        );
        let mut request = PendingRequest::new(Method::GET, "dishes/");
        request.set_bearer("A1");

        let err = stage
            .on_failure(&unauthorized(), &request, Attempt::FIRST)
            .await
            .unwrap_err();
        match err {
            ApiError::SessionExpired(reason) => {
                assert!(matches!(*reason, RefreshError::Request(ApiError::Network(_))))
            }
            other => panic!("expected SessionExpired, got {:?}", other),
        }
        assert_eq!(store.access_token().unwrap(), None);
        assert_eq!(store.refresh_token().unwrap(), None);
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::Notice(Notice::SessionExpired)
        );
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::RedirectToLogin);
    }

    #[tokio::test]
    async fn test_coalesced_reuses_token_refreshed_elsewhere() {
        let store = Arc::new(MemorySessionStore::with_pair(TokenPair::new("A2", "R1")));
        let stage = coalesced(store, SessionEvents::new(), "http://127.0.0.1:9/api/");
        let mut request = PendingRequest::new(Method::GET, "dishes/");
        request.set_bearer("A1");

        let verdict = stage
            .on_failure(&unauthorized(), &request, Attempt::FIRST)
            .await
            .unwrap();
        match verdict {
            Verdict::Replay { request, attempt } => {
                assert_eq!(request.bearer_token(), Some("A2"));
                assert_eq!(attempt.number(), 2);
            }
            Verdict::Pass => panic!("expected a replay"),
        }
    }
}
