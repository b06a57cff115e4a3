//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use clickeat_core::auth::{MemorySessionStore, SessionStore};
use clickeat_core::{ApiClient, ClientConfig, RefreshMode, SessionEvent};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use wiremock::MockServer;

pub struct Harness {
    pub server: MockServer,
    pub client: ApiClient,
    pub store: Arc<MemorySessionStore>,
    pub events: broadcast::Receiver<SessionEvent>,
}

pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::new(&format!("{}/api/", server.uri()))
        .with_redirect_delay(Duration::from_millis(20))
}

pub async fn harness(store: MemorySessionStore) -> Harness {
    harness_with(store, |config| config).await
}

pub async fn harness_with(
    store: MemorySessionStore,
    configure: impl FnOnce(ClientConfig) -> ClientConfig,
) -> Harness {
    let server = MockServer::start().await;
    let store = Arc::new(store);
    let client = ApiClient::builder()
        .config(configure(config_for(&server)))
        .store(store.clone() as Arc<dyn SessionStore>)
        .build()
        .unwrap();
    let events = client.subscribe();
    Harness {
        server,
        client,
        store,
        events,
    }
}

pub async fn coalesced(store: MemorySessionStore) -> Harness {
    harness_with(store, |config| config.with_refresh_mode(RefreshMode::Coalesced)).await
}

/// Everything published so far, without waiting.
pub fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Wait for the scheduled redirect, returning every event seen on the way.
pub async fn wait_for_redirect(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    let collect = async {
        loop {
            let event = rx.recv().await.unwrap();
            let done = event == SessionEvent::RedirectToLogin;
            seen.push(event);
            if done {
                break;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(2), collect)
        .await
        .expect("redirect to login was scheduled");
    seen
}

pub fn dish_json(id: u64, category_id: u64) -> Value {
    json!({
        "id": id,
        "name": format!("Dish {}", id),
        "description": "",
        "price": "19.90",
        "photo_url": null,
        "is_available": true,
        "category": {"id": category_id, "name": "Pizza", "slug": "pizza"},
        "ingredients": []
    })
}
