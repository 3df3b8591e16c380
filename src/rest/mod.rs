//! REST layer: transport primitive, typed gateway and the credential-bound gateway
//!
//! Data flows node handle → [`D1RestClient`] (gateway) → [`RestClient`] (transport)
//! → [`HttpExecutor`] (engine). Error translation happens in the gateway; the transport
//! only records diagnostics and releases request resources.

pub mod credentials;
pub mod gateway;
pub mod multipart;
pub mod reqwest_executor;
pub mod transport;

pub use credentials::{CredentialManager, DefaultMultipartRestClient, ExecutorFactory, StaticCredentialManager};
pub use gateway::{filter_errors, MultipartRestClient};
pub use multipart::{MultipartBody, Part, PartContent};
pub use reqwest_executor::{ReqwestExecutor, ReqwestExecutorFactory};
pub use transport::{
    HttpExecutor, HttpRequest, Method, RawResponse, RequestConfig, RestClient, TransportError,
    DEFAULT_DIAGNOSTICS_CAPACITY,
};

use crate::error::DispatchError;
use std::sync::Arc;

/// A typed REST gateway.
///
/// Every call either returns the successful response or a [`DispatchError`] telling a
/// service rejection apart from a request that never completed.
pub trait D1RestClient: Send + Sync {
    /// Issue one call. `timeout_ms` overrides the gateway's base timeouts;
    /// `follow_redirect` defaults to true.
    fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<MultipartBody>,
        timeout_ms: Option<i64>,
        follow_redirect: Option<bool>,
    ) -> Result<RawResponse, DispatchError>;

    /// Latest request made through this gateway by the calling thread
    fn latest_request(&self) -> Option<String>;

    /// The engine the next call will use
    fn current_executor(&self) -> Arc<dyn HttpExecutor>;

    fn do_get(&self, url: &str, timeout_ms: Option<i64>, follow_redirect: Option<bool>) -> Result<RawResponse, DispatchError> {
        self.send(Method::Get, url, None, timeout_ms, follow_redirect)
    }

    fn do_head(&self, url: &str, timeout_ms: Option<i64>) -> Result<RawResponse, DispatchError> {
        self.send(Method::Head, url, None, timeout_ms, None)
    }

    fn do_delete(&self, url: &str, timeout_ms: Option<i64>) -> Result<RawResponse, DispatchError> {
        self.send(Method::Delete, url, None, timeout_ms, None)
    }

    fn do_put(&self, url: &str, body: Option<MultipartBody>, timeout_ms: Option<i64>) -> Result<RawResponse, DispatchError> {
        self.send(Method::Put, url, body, timeout_ms, None)
    }

    fn do_post(&self, url: &str, body: Option<MultipartBody>, timeout_ms: Option<i64>) -> Result<RawResponse, DispatchError> {
        self.send(Method::Post, url, body, timeout_ms, None)
    }
}
