//! HTTP client for the zenaura REST API.
//!
//! `ApiClient` keeps a set of default headers that are attached to every
//! outgoing request (the session's bearer token lives there) and runs a chain
//! of response interceptors over every outcome.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{ProfileResponse, UserProfile};

use super::interceptor::{InterceptorHandle, InterceptorRegistry, RequestInfo, ResponseInterceptor};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Base URL used when no configuration overrides it
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

/// HTTP request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Profile lookup for the bearer of the current token
const PROFILE_PATH: &str = "/auth/me";

/// Server-side token revocation
const LOGOUT_PATH: &str = "/auth/logout";

/// A successful response with its body already read
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON body: {}", e)))
    }
}

/// API client for the zenaura backend.
/// Clone is cheap and clones share default headers and interceptors.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<str>,
    default_headers: Arc<RwLock<HeaderMap>>,
    interceptors: Arc<InterceptorRegistry>,
    initial_backoff: Duration,
}

impl ApiClient {
    /// Create a new API client with the default timeout
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            default_headers: Arc::new(RwLock::new(HeaderMap::new())),
            interceptors: Arc::new(InterceptorRegistry::default()),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Override the first rate-limit backoff delay (it doubles per retry)
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ===== Default headers =====

    /// Set or, with `None`, remove a header sent with every future request
    pub fn set_default_header(&self, name: HeaderName, value: Option<&str>) -> Result<(), ApiError> {
        let value = value
            .map(HeaderValue::from_str)
            .transpose()
            .map_err(|e| ApiError::InvalidHeader(format!("{}: {}", name, e)))?;

        let mut headers = self
            .default_headers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match value {
            Some(mut value) => {
                value.set_sensitive(name == reqwest::header::AUTHORIZATION);
                headers.insert(name, value);
            }
            None => {
                headers.remove(&name);
            }
        }
        Ok(())
    }

    /// Current value of a default header
    pub fn default_header(&self, name: &HeaderName) -> Option<String> {
        self.default_headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    fn current_headers(&self) -> HeaderMap {
        self.default_headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ===== Interceptors =====

    pub fn register_response_interceptor(
        &self,
        interceptor: Arc<dyn ResponseInterceptor>,
    ) -> InterceptorHandle {
        self.interceptors.register(interceptor)
    }

    /// Returns false if the handle was already revoked
    pub fn unregister_response_interceptor(&self, handle: InterceptorHandle) -> bool {
        self.interceptors.unregister(handle)
    }

    pub fn interceptor_count(&self) -> usize {
        self.interceptors.len()
    }

    // ===== Requests =====

    /// Issue a request against the API and run the interceptor chain over the outcome.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, ApiError> {
        let info = RequestInfo {
            method,
            path: path.to_string(),
        };

        match self.send(&info, body).await {
            Ok(mut response) => {
                for interceptor in self.interceptors.snapshot() {
                    response = interceptor.on_success(&info, response);
                }
                Ok(response)
            }
            Err(mut error) => {
                for interceptor in self.interceptors.snapshot() {
                    error = interceptor.on_failure(&info, error).await;
                }
                Err(error)
            }
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: reqwest::Response) -> Result<Option<ApiResponse>, ApiError> {
        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            Ok(Some(ApiResponse { status, body }))
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            Ok(None)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send(&self, info: &RequestInfo, body: Option<&Value>) -> Result<ApiResponse, ApiError> {
        let url = self.url(&info.path);
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let mut builder = self
                .client
                .request(info.method.clone(), &url)
                .headers(self.current_headers());
            if let Some(body) = body {
                builder = builder.json(body);
            }

            debug!(method = %info.method, url = %url, "Sending request");
            let response = builder.send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    let backoff_ms = backoff.as_millis() as u64;
                    warn!(url = %url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2; // Exponential backoff
                }
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::GET, path, None).await?.json()
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ApiError> {
        self.request(Method::POST, path, Some(body)).await?.json()
    }

    // ===== Auth endpoints =====

    /// Look up the profile of whoever the current default token belongs to
    pub async fn fetch_current_user(&self) -> Result<UserProfile, ApiError> {
        let response: ProfileResponse = self.get(PROFILE_PATH).await?;
        Ok(response.user)
    }

    /// Ask the server to revoke the current token. The response body is ignored.
    pub async fn revoke_session(&self) -> Result<(), ApiError> {
        self.request(Method::POST, LOGOUT_PATH, None).await?;
        Ok(())
    }
}
