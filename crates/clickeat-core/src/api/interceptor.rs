//! Request/response interception stages.
//!
//! `ApiClient` runs every request through an ordered list of `Interceptor`s.
//! Before each dispatch all stages may adjust the outgoing request; after a
//! failed dispatch the stages are asked in order what to do about the error.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::request::{Attempt, PendingRequest};
use super::ApiError;
use crate::auth::SessionStore;
use crate::events::{Notice, SessionEvents};

/// What a stage decided about a failed dispatch.
#[derive(Debug)]
pub enum Verdict {
    /// Not handled here; the next stage gets a look.
    Pass,
    /// Send this request again. `attempt` must be the successor of the
    /// attempt that failed, otherwise the client refuses the replay.
    Replay {
        request: PendingRequest,
        attempt: Attempt,
    },
}

#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Pre-request stage, run before every dispatch including replays.
    fn on_request(&self, _request: &mut PendingRequest, _attempt: Attempt) {}

    /// Post-response stage for non-2xx and transport failures. Returning
    /// `Err` replaces the failure the caller sees.
    async fn on_failure(
        &self,
        _error: &ApiError,
        _request: &PendingRequest,
        _attempt: Attempt,
    ) -> Result<Verdict, ApiError> {
        Ok(Verdict::Pass)
    }
}

// ============================================================================
// Credential attachment
// ============================================================================

/// Attaches `Authorization: Bearer <access token>` from the session store.
pub struct BearerAuth {
    store: Arc<dyn SessionStore>,
}

impl BearerAuth {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Interceptor for BearerAuth {
    fn on_request(&self, request: &mut PendingRequest, attempt: Attempt) {
        // An explicit header (or the token a replay was planned with) wins
        if request.has_authorization() {
            return;
        }
        match self.store.access_token() {
            Ok(Some(token)) => {
                if !request.set_bearer(&token) {
                    warn!("Stored access token is not a valid header value; sending unauthenticated");
                }
            }
            Ok(None) => {
                debug!(path = %request.path, attempt = attempt.number(), "No access token; sending unauthenticated");
            }
            Err(e) => {
                warn!(error = %e, "Could not read access token; sending unauthenticated");
            }
        }
    }
}

// ============================================================================
// Timeout reporting
// ============================================================================

/// Tells the user the server is not answering. Never handles the error.
pub struct TimeoutNotice {
    events: SessionEvents,
}

impl TimeoutNotice {
    pub fn new(events: SessionEvents) -> Self {
        Self { events }
    }
}

#[async_trait]
impl Interceptor for TimeoutNotice {
    async fn on_failure(
        &self,
        error: &ApiError,
        request: &PendingRequest,
        _attempt: Attempt,
    ) -> Result<Verdict, ApiError> {
        if error.is_timeout() {
            warn!(method = %request.method, path = %request.path, "Request timed out");
            self.events.notice(Notice::ServerNotResponding);
        }
        Ok(Verdict::Pass)
    }
}
