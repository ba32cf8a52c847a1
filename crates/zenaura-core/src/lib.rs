//! Core library for zenaura: the API client, the authentication session
//! manager, and token persistence.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{SessionManager, SessionSnapshot, SessionStatus, SessionStore};
pub use config::{Config, StorageBackend};
pub use models::UserProfile;
