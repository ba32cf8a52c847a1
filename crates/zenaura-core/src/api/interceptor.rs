//! Response interceptors for `ApiClient`.
//!
//! An interceptor sees every response after retries are exhausted and before
//! the caller does. Registration returns an `InterceptorHandle` that revokes
//! it again; interceptors run in registration order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::BoxFuture;
use reqwest::Method;

use super::client::ApiResponse;
use super::ApiError;

/// The request a response belongs to, as seen by interceptors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    pub method: Method,
    pub path: String,
}

/// Observer on the client's response pipeline.
///
/// `on_failure` receives ownership of the error and must hand back the error
/// the caller will see. It is async so an interceptor can finish side effects
/// (such as tearing down a session) before the caller observes the failure.
pub trait ResponseInterceptor: Send + Sync {
    fn on_success(&self, _request: &RequestInfo, response: ApiResponse) -> ApiResponse {
        response
    }

    fn on_failure<'a>(
        &'a self,
        _request: &'a RequestInfo,
        error: ApiError,
    ) -> BoxFuture<'a, ApiError> {
        Box::pin(async move { error })
    }
}

/// Revocation handle returned by `ApiClient::register_response_interceptor`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorHandle(u64);

#[derive(Default)]
pub(crate) struct InterceptorRegistry {
    next_id: AtomicU64,
    entries: RwLock<Vec<(InterceptorHandle, Arc<dyn ResponseInterceptor>)>>,
}

impl InterceptorRegistry {
    pub(crate) fn register(&self, interceptor: Arc<dyn ResponseInterceptor>) -> InterceptorHandle {
        let handle = InterceptorHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((handle, interceptor));
        handle
    }

    /// Returns false if the handle was already revoked
    pub(crate) fn unregister(&self, handle: InterceptorHandle) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(h, _)| *h != handle);
        entries.len() != before
    }

    /// Clone the current chain so no lock is held while interceptors run
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn ResponseInterceptor>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, i)| Arc::clone(i))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
