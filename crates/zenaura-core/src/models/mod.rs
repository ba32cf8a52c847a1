//! Data models shared between the API client and the session manager.
//!
//! - `UserProfile`: the authenticated user as returned by `/auth/me`
//! - `ProfileResponse`: the `{ "user": ... }` envelope around it

pub mod user;

pub use user::{ProfileResponse, UserId, UserProfile};
