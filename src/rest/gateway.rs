//! Typed REST gateway
//!
//! Wraps the transport, derives the per-call request configuration and turns every
//! non-successful response into a [`ServiceFault`]. Transport failures become a single
//! [`ClientError::Transport`].

use super::transport::{HttpExecutor, Method, RawResponse, RequestConfig, RestClient};
use super::{D1RestClient, MultipartBody};
use crate::error::{fault_from_headers, ClientError, DispatchError, ErrorKind, ServiceFault};
use std::sync::Arc;

/// Longest slice of a non-envelope error body kept in the fallback description
const MAX_BODY_EXCERPT: usize = 512;

/// Gateway over a shared [`RestClient`]
#[derive(Debug, Clone)]
pub struct MultipartRestClient {
    rest_client: Arc<RestClient>,
    base_config: Option<RequestConfig>,
}

impl MultipartRestClient {
    pub fn new(rest_client: Arc<RestClient>) -> Self {
        Self {
            rest_client,
            base_config: None,
        }
    }

    /// Configuration used for calls that pass no timeout
    pub fn with_base_config(mut self, config: RequestConfig) -> Self {
        self.base_config = Some(config);
        self
    }

    pub fn with_default_timeout(self, timeout_ms: i64) -> Self {
        self.with_base_config(RequestConfig::with_timeout(timeout_ms))
    }

    pub fn rest_client(&self) -> &Arc<RestClient> {
        &self.rest_client
    }

    pub fn base_config(&self) -> Option<&RequestConfig> {
        self.base_config.as_ref()
    }

    /// Effective configuration for one call
    pub fn request_config(&self, timeout_ms: Option<i64>, follow_redirect: Option<bool>) -> RequestConfig {
        RequestConfig::overlay(self.base_config.as_ref(), timeout_ms, follow_redirect)
    }
}

impl D1RestClient for MultipartRestClient {
    fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<MultipartBody>,
        timeout_ms: Option<i64>,
        follow_redirect: Option<bool>,
    ) -> Result<RawResponse, DispatchError> {
        let config = self.request_config(timeout_ms, follow_redirect);
        let response = self
            .rest_client
            .execute(method, url, body, &config)
            .map_err(|e| ClientError::Transport(format!("{} {}: {}", method, url, e)))?;
        filter_errors(response)
    }

    fn latest_request(&self) -> Option<String> {
        self.rest_client.latest_request()
    }

    fn current_executor(&self) -> Arc<dyn HttpExecutor> {
        self.rest_client.executor()
    }
}

/// Pass successful responses through and decode everything else into a fault.
///
/// A 303 is a success: it only reaches here when the caller disabled redirects and
/// wants the redirect response itself.
pub fn filter_errors(response: RawResponse) -> Result<RawResponse, DispatchError> {
    if response.is_success() || response.status == 303 {
        return Ok(response);
    }

    // Step 1: the XML error envelope in the body
    if !response.body.is_empty() {
        match ServiceFault::from_xml(&response.body) {
            Ok(fault) => {
                log::debug!("Service returned {} ({})", fault.kind(), response.status);
                return Err(fault.into());
            }
            Err(e) => log::debug!("Error response is not an envelope: {}", e),
        }
    }

    // Step 2: HEAD responses carry the same fields in headers
    if let Some(fault) = fault_from_headers(response.status, |name| response.header(name)) {
        return Err(fault.into());
    }

    // Step 3: nothing usable, report a generic failure
    let mut excerpt = response.body_text();
    if excerpt.len() > MAX_BODY_EXCERPT {
        let mut end = MAX_BODY_EXCERPT;
        while !excerpt.is_char_boundary(end) {
            end -= 1;
        }
        excerpt.truncate(end);
    }
    let description = if excerpt.trim().is_empty() {
        format!("Unexpected HTTP status {} with no error details", response.status)
    } else {
        format!("Unexpected HTTP status {}: {}", response.status, excerpt.trim())
    };
    Err(ServiceFault::new(ErrorKind::ServiceFailure, "0", description)
        .with_error_code(response.status)
        .into())
}
