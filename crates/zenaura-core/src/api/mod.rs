//! REST API client module for the zenaura backend.
//!
//! This module provides the `ApiClient` for issuing requests, the
//! `ApiError` taxonomy for failed responses, and the response interceptor
//! hooks the session manager uses to react to authorization failures.
//!
//! The API authenticates requests with a bearer token sent as a default
//! `Authorization` header.

pub mod client;
pub mod error;
pub mod interceptor;

pub use client::{ApiClient, ApiResponse, DEFAULT_API_BASE_URL, REQUEST_TIMEOUT_SECS};
pub use error::ApiError;
pub use interceptor::{InterceptorHandle, RequestInfo, ResponseInterceptor};
pub use reqwest::Method;
