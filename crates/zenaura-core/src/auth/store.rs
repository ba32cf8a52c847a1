//! Session store: the single writer of the persisted token and the API
//! client's `Authorization` default header.

use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use tracing::{debug, warn};

use crate::api::ApiClient;

use super::storage::TokenStorage;

/// Storage key for the session token
pub const TOKEN_KEY: &str = "zenaura_token";

/// Keeps persistence and the outgoing auth header in step.
///
/// Every operation leaves the persisted token and the default header equal
/// (both the token, or both absent), unless the storage medium itself is
/// failing, in which case the header alone carries the session for the life
/// of the process.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn TokenStorage>,
    api: ApiClient,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn TokenStorage>, api: ApiClient) -> Self {
        Self { storage, api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Persist the token and send it with every future request.
    /// Never fails; storage errors are logged and the header is still set.
    pub fn set_token(&self, token: &str) {
        if let Err(e) = self.storage.set(TOKEN_KEY, token) {
            warn!(error = %e, "Failed to persist session token");
        }
        if let Err(e) = self.install_header(token) {
            // A token that cannot travel as a header is as good as none
            warn!(error = %e, "Session token is not a valid header value, discarding it");
            self.clear_token();
        }
    }

    /// Remove the persisted token and stop sending the auth header.
    /// Safe to call when no token exists.
    pub fn clear_token(&self) {
        if let Err(e) = self.storage.remove(TOKEN_KEY) {
            warn!(error = %e, "Failed to remove persisted session token");
        }
        if let Err(e) = self.api.set_default_header(AUTHORIZATION, None) {
            warn!(error = %e, "Failed to clear auth header");
        }
    }

    /// The persisted token, if any. Unreadable storage counts as no token.
    pub fn get_token(&self) -> Option<String> {
        match self.storage.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                debug!(error = %e, "Token storage unavailable, treating as logged out");
                None
            }
        }
    }

    /// Re-install a previously persisted token as the auth header without
    /// rewriting storage. An unusable token is cleared and `false` returned.
    pub fn restore_token(&self, token: &str) -> bool {
        match self.install_header(token) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Persisted session token is not a valid header value, discarding it");
                self.clear_token();
                false
            }
        }
    }

    fn install_header(&self, token: &str) -> Result<(), crate::api::ApiError> {
        self.api
            .set_default_header(AUTHORIZATION, Some(&format!("Bearer {}", token)))
    }

    /// Value the API client currently sends, without the `Bearer ` prefix
    pub fn header_token(&self) -> Option<String> {
        self.api
            .default_header(&AUTHORIZATION)
            .and_then(|v| v.strip_prefix("Bearer ").map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DEFAULT_API_BASE_URL;
    use crate::auth::storage::{MemoryStorage, UnavailableStorage};

    fn store_with(storage: Arc<dyn TokenStorage>) -> SessionStore {
        SessionStore::new(storage, ApiClient::new(DEFAULT_API_BASE_URL).unwrap())
    }

    #[test]
    fn test_set_and_clear_keep_header_in_step() {
        let store = store_with(Arc::new(MemoryStorage::new()));

        store.set_token("tok1");
        assert_eq!(store.get_token().as_deref(), Some("tok1"));
        assert_eq!(store.header_token(), store.get_token());
        assert_eq!(
            store.api().default_header(&AUTHORIZATION).as_deref(),
            Some("Bearer tok1")
        );

        store.set_token("tok2");
        assert_eq!(store.header_token().as_deref(), Some("tok2"));
        assert_eq!(store.header_token(), store.get_token());

        store.clear_token();
        assert_eq!(store.get_token(), None);
        assert_eq!(store.header_token(), None);
    }

    #[test]
    fn test_clear_without_token_is_noop() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        store.clear_token();
        store.clear_token();
        assert_eq!(store.get_token(), None);
        assert_eq!(store.header_token(), None);
    }

    #[test]
    fn test_restore_installs_header_from_storage() {
        let store = store_with(Arc::new(MemoryStorage::with_entry(TOKEN_KEY, "persisted")));
        assert_eq!(store.header_token(), None);

        let token = store.get_token().unwrap();
        assert!(store.restore_token(&token));
        assert_eq!(store.header_token().as_deref(), Some("persisted"));
    }

    #[test]
    fn test_restore_discards_unusable_token() {
        let store = store_with(Arc::new(MemoryStorage::with_entry(TOKEN_KEY, "bad\ntoken")));
        assert!(!store.restore_token("bad\ntoken"));
        assert_eq!(store.get_token(), None);
        assert_eq!(store.header_token(), None);
    }

    #[test]
    fn test_empty_persisted_token_is_absent() {
        let store = store_with(Arc::new(MemoryStorage::with_entry(TOKEN_KEY, "")));
        assert_eq!(store.get_token(), None);
    }

    #[test]
    fn test_unusable_token_is_discarded() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        store.set_token("good");
        store.set_token("bad\ntoken");
        assert_eq!(store.get_token(), None);
        assert_eq!(store.header_token(), None);
    }

    #[test]
    fn test_unavailable_storage_degrades_silently() {
        let store = store_with(Arc::new(UnavailableStorage));
        assert_eq!(store.get_token(), None);

        store.set_token("tok");
        assert_eq!(store.header_token().as_deref(), Some("tok"));

        store.clear_token();
        assert_eq!(store.header_token(), None);
    }
}
