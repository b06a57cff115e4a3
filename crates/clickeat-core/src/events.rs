//! Session events and user-facing notices.
//!
//! The API client never renders anything itself. It publishes `SessionEvent`s
//! on a broadcast channel; the application decides how to show notices
//! (toasts, status line, stderr) and where to send the user on
//! `RedirectToLogin`.

use std::fmt;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::debug;

/// Broadcast buffer size. Notices are small and consumed promptly.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Categories,
    Dishes,
    Staff,
    Profile,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Categories => write!(f, "categories"),
            Resource::Dishes => write!(f, "dishes"),
            Resource::Staff => write!(f, "staff accounts"),
            Resource::Profile => write!(f, "profile"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    SessionExpired,
    ServerNotResponding,
    LoadFailed(Resource),
    SaveFailed(Resource),
    DeleteFailed(Resource),
    /// The item was already gone when the user tried to act on it.
    NotFound(Resource),
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::SessionExpired => "Your session has expired. Please log in again.".to_string(),
            Notice::ServerNotResponding => {
                "The server is not responding. Please try again later.".to_string()
            }
            Notice::LoadFailed(resource) => format!("Could not load {}.", resource),
            Notice::SaveFailed(resource) => format!("Could not save {}.", resource),
            Notice::DeleteFailed(resource) => format!("Could not delete {}.", resource),
            Notice::NotFound(_) => "This item no longer exists.".to_string(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Notice(Notice),
    /// Credentials are gone; send the user to the login entry point.
    RedirectToLogin,
    LoggedIn,
    LoggedOut,
}

/// Sender side of the session event channel. Clone is cheap.
#[derive(Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        debug!(?event, "Session event");
        // No subscribers is fine: nobody is listening for notices
        let _ = self.tx.send(event);
    }

    pub fn notice(&self, notice: Notice) {
        self.emit(SessionEvent::Notice(notice));
    }

    /// Fire `RedirectToLogin` once after `delay`, giving the user time to see
    /// the preceding notice.
    pub fn schedule_redirect(&self, delay: Duration) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("Redirecting to login");
            let _ = tx.send(SessionEvent::RedirectToLogin);
        });
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_messages() {
        assert_eq!(
            Notice::LoadFailed(Resource::Categories).message(),
            "Could not load categories."
        );
        assert_eq!(
            Notice::DeleteFailed(Resource::Staff).to_string(),
            "Could not delete staff accounts."
        );
        assert!(Notice::SessionExpired.message().contains("log in again"));
    }

    #[test]
    fn test_emit_without_subscribers_does_not_panic() {
        let events = SessionEvents::new();
        events.notice(Notice::ServerNotResponding);
    }

    #[tokio::test]
    async fn test_subscribers_receive_notices() {
        let events = SessionEvents::new();
        let mut rx = events.subscribe();
        events.notice(Notice::SaveFailed(Resource::Dishes));
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::Notice(Notice::SaveFailed(Resource::Dishes))
        );
    }

    #[tokio::test]
    async fn test_schedule_redirect_fires_once() {
        let events = SessionEvents::new();
        let mut rx = events.subscribe();
        events.schedule_redirect(Duration::from_millis(5));

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("redirect fired")
            .unwrap();
        assert_eq!(event, SessionEvent::RedirectToLogin);

        let again = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(again.is_err());
    }
}
