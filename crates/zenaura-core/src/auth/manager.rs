//! Session manager: the authentication state machine.
//!
//! The manager owns `{ token, user, loading }`, reconciles a persisted token
//! against `/auth/me` at startup, and hooks the API client's response
//! pipeline so that any 401 tears the session down.
//!
//! Every login and logout bumps a session generation. Async continuations
//! capture the generation when they start and only apply their result if it
//! is unchanged, so a profile fetch that resolves after a logout cannot bring
//! the user back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::future::BoxFuture;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiError, InterceptorHandle, RequestInfo, ResponseInterceptor};
use crate::models::UserProfile;

use super::navigation::Navigator;
use super::store::SessionStore;

/// Generation of a session nobody has logged in or out of yet
const INITIAL_GENERATION: u64 = 0;

/// Observable session state
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
    pub loading: bool,
    /// Bumped by every login and logout
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Initializing,
    Unauthenticated,
    Authenticated,
    /// A token is installed but no profile has been resolved for it
    Unverified,
}

impl SessionSnapshot {
    pub fn status(&self) -> SessionStatus {
        if self.loading {
            SessionStatus::Initializing
        } else if self.user.is_some() {
            SessionStatus::Authenticated
        } else if self.token.is_none() {
            SessionStatus::Unauthenticated
        } else {
            SessionStatus::Unverified
        }
    }
}

struct SessionCore {
    store: SessionStore,
    navigator: Arc<dyn Navigator>,
    state: watch::Sender<SessionSnapshot>,
    /// Serializes session mutations together with their storage writes.
    /// Never held across an await.
    writer: Mutex<()>,
    reconcile_started: AtomicBool,
    revoking: AtomicBool,
}

impl SessionCore {
    fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish_loading(&self) {
        self.state.send_if_modified(|s| std::mem::replace(&mut s.loading, false));
    }

    /// Drop the token from storage and the header, then publish user and
    /// token as cleared in one step. Caller holds the writer lock.
    fn clear_session(&self) {
        self.store.clear_token();
        self.state.send_modify(|s| {
            s.generation += 1;
            s.user = None;
            s.token = None;
        });
    }

    fn clear_local(&self) {
        let _writer = self.lock_writer();
        self.clear_session();
    }

    async fn logout(&self) {
        if self.revoking.swap(true, Ordering::SeqCst) {
            // Either a concurrent logout or our own revocation call came back 401
            debug!("Logout already in progress, clearing local session only");
            self.clear_local();
            return;
        }
        let _revoking = RevokingGuard(&self.revoking);
        let generation = self.generation();

        if let Err(e) = self.store.api().revoke_session().await {
            debug!(error = %e, "Token revocation failed, continuing with local logout");
        }

        let cleared = {
            let _writer = self.lock_writer();
            let current = self.snapshot();
            if current.generation != generation && current.token.is_some() {
                debug!("New login during logout, keeping the newer session");
                false
            } else {
                self.clear_session();
                true
            }
        };
        if cleared {
            info!("Logged out");
            self.navigator.redirect_to_login();
        }
    }
}

/// Resets the in-progress flag even if the logout future is dropped mid-flight
struct RevokingGuard<'a>(&'a AtomicBool);

impl Drop for RevokingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Logs failed requests and logs out on 401
struct AutoLogout {
    core: Weak<SessionCore>,
}

impl ResponseInterceptor for AutoLogout {
    fn on_failure<'a>(
        &'a self,
        request: &'a RequestInfo,
        error: ApiError,
    ) -> BoxFuture<'a, ApiError> {
        Box::pin(async move {
            let status = error.status().map(|s| s.as_u16());
            warn!(
                method = %request.method,
                path = %request.path,
                status = ?status,
                error = %error,
                "Request failed"
            );

            if error.is_unauthorized() {
                if let Some(core) = self.core.upgrade() {
                    warn!(path = %request.path, "Auto-logout triggered by 401");
                    core.logout().await;
                }
            }
            error
        })
    }
}

/// Owner of the process-wide session.
///
/// Create one per process with `new`, run `reconcile` once, and call
/// `teardown` (or drop it) when done. Dropping unregisters the auto-logout
/// interceptor from the API client.
pub struct SessionManager {
    core: Arc<SessionCore>,
    interceptor: Option<InterceptorHandle>,
}

impl SessionManager {
    pub fn new(store: SessionStore, navigator: Arc<dyn Navigator>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot {
            token: store.get_token(),
            user: None,
            loading: true,
            generation: INITIAL_GENERATION,
        });

        let core = Arc::new(SessionCore {
            store,
            navigator,
            state,
            writer: Mutex::new(()),
            reconcile_started: AtomicBool::new(false),
            revoking: AtomicBool::new(false),
        });

        let interceptor = core.store.api().register_response_interceptor(Arc::new(AutoLogout {
            core: Arc::downgrade(&core),
        }));

        Self {
            core,
            interceptor: Some(interceptor),
        }
    }

    /// Validate the persisted token against the server and resolve `user`.
    ///
    /// Settles `loading` to false exactly once. Only the first call does any
    /// work; later calls return immediately.
    pub async fn reconcile(&self) {
        let core = &self.core;
        if core.reconcile_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let restored = {
            let _writer = core.lock_writer();
            let current = core.snapshot();
            if current.generation != INITIAL_GENERATION {
                debug!("Session replaced before reconciliation, nothing to verify");
                None
            } else if let Some(token) = current.token {
                if core.store.restore_token(&token) {
                    Some(current.generation)
                } else {
                    core.clear_session();
                    None
                }
            } else {
                debug!("No persisted session token");
                None
            }
        };
        let Some(generation) = restored else {
            core.finish_loading();
            return;
        };

        let result = core.store.api().fetch_current_user().await;
        {
            let _writer = core.lock_writer();
            if core.generation() != generation {
                debug!("Session changed during reconciliation, discarding result");
            } else {
                match result {
                    Ok(user) => {
                        info!(user = %user.display_name(), "Session restored");
                        core.state.send_modify(|s| s.user = Some(user));
                    }
                    Err(e) => {
                        warn!(error = %e, "Persisted session token rejected, clearing it");
                        core.clear_session();
                    }
                }
            }
        }
        core.finish_loading();
    }

    /// Install a new token and resolve the user it belongs to.
    ///
    /// An empty token is ignored. With `initial_user` the user is set
    /// immediately and no profile fetch is made. Without it the profile is
    /// fetched; on failure the user is cleared but the token is kept.
    pub async fn login(&self, token: &str, initial_user: Option<UserProfile>) -> Option<UserProfile> {
        if token.is_empty() {
            debug!("Ignoring login with empty token");
            return None;
        }
        let core = &self.core;

        let (generation, installed) = {
            let _writer = core.lock_writer();
            core.store.set_token(token);
            let installed = core.store.header_token();
            let mut generation = 0;
            core.state.send_modify(|s| {
                s.generation += 1;
                generation = s.generation;
                if installed.is_none() {
                    s.user = None;
                } else if let Some(ref user) = initial_user {
                    s.user = Some(user.clone());
                }
                s.token = installed.clone();
            });
            (generation, installed.is_some())
        };
        if !installed {
            return None;
        }

        if let Some(user) = initial_user {
            info!(user = %user.display_name(), "Logged in");
            return Some(user);
        }

        let result = core.store.api().fetch_current_user().await;
        let _writer = core.lock_writer();
        if core.generation() != generation {
            debug!("Session changed during login, discarding profile result");
            return None;
        }
        match result {
            Ok(user) => {
                info!(user = %user.display_name(), "Logged in");
                core.state.send_modify(|s| s.user = Some(user.clone()));
                Some(user)
            }
            Err(e) => {
                warn!(error = %e, "Profile lookup after login failed");
                core.state.send_modify(|s| s.user = None);
                None
            }
        }
    }

    /// Revoke the token on the server (best effort), then clear the user,
    /// clear the token, and navigate to the login surface.
    pub async fn logout(&self) {
        self.core.logout().await;
    }

    /// Replace the current user, for example after a profile edit.
    /// Setting a user is ignored while no token is installed.
    pub fn set_user(&self, user: Option<UserProfile>) {
        self.core.state.send_if_modified(|s| {
            if user.is_some() && s.token.is_none() {
                warn!("Ignoring user update without a session token");
                return false;
            }
            s.user = user;
            true
        });
    }

    // ===== Accessors =====

    pub fn snapshot(&self) -> SessionSnapshot {
        self.core.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.core.state.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.core.state.borrow().status()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.core.state.borrow().user.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.core.state.borrow().token.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.core.state.borrow().loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &SessionStore {
        &self.core.store
    }

    /// Unregister the auto-logout interceptor and release the session
    pub fn teardown(mut self) {
        self.release_interceptor();
    }

    fn release_interceptor(&mut self) {
        if let Some(handle) = self.interceptor.take() {
            self.core.store.api().unregister_response_interceptor(handle);
            debug!("Session manager torn down");
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.release_interceptor();
    }
}
