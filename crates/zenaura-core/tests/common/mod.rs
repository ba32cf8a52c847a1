//! Shared fixtures for session integration tests
//!
//! Builds a `SessionManager` wired to a wiremock server with in-memory token
//! storage and a navigator that counts redirects.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use wiremock::MockServer;
use zenaura_core::api::ApiClient;
use zenaura_core::auth::{MemoryStorage, Navigator, SessionManager, SessionStore, TokenStorage, TOKEN_KEY};

/// Navigator that records how often logout asked for the login surface
#[derive(Default)]
pub struct RecordingNavigator {
    redirects: AtomicUsize,
}

impl RecordingNavigator {
    pub fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn redirect_to_login(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub server: MockServer,
    pub api: ApiClient,
    pub storage: Arc<MemoryStorage>,
    pub navigator: Arc<RecordingNavigator>,
    pub manager: SessionManager,
}

impl Harness {
    /// Fresh mock server, optionally with a token already persisted
    pub async fn start(persisted: Option<&str>) -> Self {
        Self::start_with_timeout(persisted, Duration::from_secs(5)).await
    }

    pub async fn start_with_timeout(persisted: Option<&str>, timeout: Duration) -> Self {
        let server = MockServer::start().await;
        let api = ApiClient::with_timeout(&server.uri(), timeout)
            .expect("client builds")
            .with_initial_backoff(Duration::from_millis(10));
        let storage = Arc::new(match persisted {
            Some(token) => MemoryStorage::with_entry(TOKEN_KEY, token),
            None => MemoryStorage::new(),
        });
        let navigator = Arc::new(RecordingNavigator::default());
        let manager = SessionManager::new(
            SessionStore::new(storage.clone(), api.clone()),
            navigator.clone(),
        );

        Self {
            server,
            api,
            storage,
            navigator,
            manager,
        }
    }

    pub fn persisted_token(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY).expect("memory storage never fails")
    }

    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|r| r.len())
            .unwrap_or(0)
    }
}
