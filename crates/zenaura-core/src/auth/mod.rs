//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionManager`: the login/logout state machine with auto-logout on 401
//! - `SessionStore`: keeps the persisted token and the auth header in step
//! - `TokenStorage` backends: `FileStorage`, `KeyringStorage`, `MemoryStorage`
//! - `Navigator`: the "back to login" side effect requested by logout

pub mod credentials;
pub mod manager;
pub mod navigation;
pub mod storage;
pub mod store;

pub use credentials::KeyringStorage;
pub use manager::{SessionManager, SessionSnapshot, SessionStatus};
pub use navigation::{Navigator, NoopNavigator};
pub use storage::{FileStorage, MemoryStorage, StorageError, TokenStorage, UnavailableStorage};
pub use store::{SessionStore, TOKEN_KEY};
