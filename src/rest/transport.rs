//! Transport primitive
//!
//! [`RestClient`] issues one raw HTTP exchange per call through a pluggable
//! [`HttpExecutor`], applies the static header set, and remembers the latest request
//! made by each calling thread for diagnostics.

use super::multipart::MultipartBody;
use bytes::Bytes;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;
use thiserror::Error;

/// Default bound on the per-thread diagnostic map
pub const DEFAULT_DIAGNOSTICS_CAPACITY: usize = 256;

/// HTTP verbs used by the node surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }

    /// Only PUT and POST carry a body
    pub fn accepts_body(&self) -> bool {
        matches!(self, Method::Put | Method::Post)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timeout and redirect policy for one exchange.
///
/// Timeouts are in milliseconds. `None` is the unset sentinel; a value of zero or
/// below means "no timeout" to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestConfig {
    pub connect_timeout_ms: Option<i64>,
    pub request_timeout_ms: Option<i64>,
    pub socket_timeout_ms: Option<i64>,
    pub follow_redirects: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self::unset()
    }
}

impl RequestConfig {
    /// No timeouts, redirects followed
    pub fn unset() -> Self {
        Self {
            connect_timeout_ms: None,
            request_timeout_ms: None,
            socket_timeout_ms: None,
            follow_redirects: true,
        }
    }

    /// Connect, request and socket timeouts all set to `timeout_ms`
    pub fn with_timeout(timeout_ms: i64) -> Self {
        Self {
            connect_timeout_ms: Some(timeout_ms),
            request_timeout_ms: Some(timeout_ms),
            socket_timeout_ms: Some(timeout_ms),
            follow_redirects: true,
        }
    }

    /// Derive the configuration for one call.
    ///
    /// A given `timeout_ms` replaces all three timeouts. Without one, the base
    /// configuration's timeouts are used, or the unset sentinel when there is no base.
    /// Redirects are followed unless `follow_redirect` says otherwise.
    pub fn overlay(base: Option<&RequestConfig>, timeout_ms: Option<i64>, follow_redirect: Option<bool>) -> Self {
        let mut config = match (timeout_ms, base) {
            (Some(timeout), _) => Self::with_timeout(timeout),
            (None, Some(base)) => *base,
            (None, None) => Self::unset(),
        };
        config.follow_redirects = follow_redirect.unwrap_or(true);
        config
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        positive_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        positive_millis(self.request_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Option<Duration> {
        positive_millis(self.socket_timeout_ms)
    }
}

fn positive_millis(value: Option<i64>) -> Option<Duration> {
    value.filter(|ms| *ms > 0).map(|ms| Duration::from_millis(ms as u64))
}

/// Status, headers and body of a completed exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First value of a header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Everything an engine needs to perform one exchange
#[derive(Debug, Clone, Copy)]
pub struct HttpRequest<'a> {
    pub method: Method,
    pub url: &'a str,
    pub headers: &'a [(String, String)],
    pub body: Option<&'a MultipartBody>,
    pub config: &'a RequestConfig,
}

/// Failures raised while executing an exchange
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),
}

impl From<std::io::Error> for TransportError {
    fn from(error: std::io::Error) -> Self {
        TransportError::Io(error.to_string())
    }
}

/// The engine that actually talks HTTP
pub trait HttpExecutor: Send + Sync {
    fn execute(&self, request: &HttpRequest<'_>) -> Result<RawResponse, TransportError>;

    /// Short human-readable description of the engine and its credentials
    fn describe(&self) -> String;
}

/// Raw HTTP transport shared by every node handle of a gateway.
pub struct RestClient {
    executor: RwLock<Arc<dyn HttpExecutor>>,
    headers: Vec<(String, String)>,
    latest_requests: Mutex<LruCache<ThreadId, String>>,
}

impl RestClient {
    pub fn new(executor: Arc<dyn HttpExecutor>) -> Self {
        Self {
            executor: RwLock::new(executor),
            headers: Vec::new(),
            latest_requests: Mutex::new(LruCache::new(capacity(DEFAULT_DIAGNOSTICS_CAPACITY))),
        }
    }

    /// Headers sent with every request
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    /// Number of threads whose latest request is remembered
    pub fn with_diagnostics_capacity(self, diagnostics_capacity: usize) -> Self {
        Self {
            latest_requests: Mutex::new(LruCache::new(capacity(diagnostics_capacity))),
            ..self
        }
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// The engine used by the next call
    pub fn executor(&self) -> Arc<dyn HttpExecutor> {
        Arc::clone(&self.executor.read())
    }

    /// Replace the engine. Calls already holding the previous engine finish with it.
    pub fn swap_executor(&self, executor: Arc<dyn HttpExecutor>) -> Arc<dyn HttpExecutor> {
        std::mem::replace(&mut *self.executor.write(), executor)
    }

    /// Perform one exchange.
    ///
    /// The latest-request descriptor is recorded and any spooled body parts are released
    /// whatever the outcome.
    pub fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<MultipartBody>,
        config: &RequestConfig,
    ) -> Result<RawResponse, TransportError> {
        let descriptor = match &body {
            Some(body) if !body.is_empty() => format!("{} {}; {}", method, url, body.summary()),
            _ => format!("{} {}", method, url),
        };
        log::debug!("{}", descriptor);

        let result = if body.is_some() && !method.accepts_body() {
            Err(TransportError::IllegalState(format!("{} requests cannot carry a body", method)))
        } else {
            let executor = self.executor();
            executor.execute(&HttpRequest {
                method,
                url,
                headers: &self.headers,
                body: body.as_ref(),
                config,
            })
        };

        if let Some(body) = body {
            body.release();
        }
        self.latest_requests.lock().put(thread::current().id(), descriptor);

        result
    }

    /// Latest request made by the calling thread
    pub fn latest_request(&self) -> Option<String> {
        self.latest_request_for(thread::current().id())
    }

    /// Latest request made by another thread. May race with that thread's next call.
    pub fn latest_request_for(&self, thread_id: ThreadId) -> Option<String> {
        self.latest_requests.lock().peek(&thread_id).cloned()
    }
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("executor", &self.executor().describe())
            .field("headers", &self.headers)
            .finish()
    }
}

fn capacity(value: usize) -> NonZeroUsize {
    NonZeroUsize::new(value).unwrap_or(NonZeroUsize::MIN)
}
