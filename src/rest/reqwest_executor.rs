//! HTTP engine backed by the blocking `reqwest` client

use super::credentials::ExecutorFactory;
use super::multipart::{MultipartBody, PartContent};
use super::transport::{HttpExecutor, HttpRequest, Method, RawResponse, TransportError};
use crate::error::ClientError;
use crate::types::Session;
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::blocking::{multipart, Client};
use reqwest::redirect::Policy;
use reqwest::Identity;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// reqwest fixes connect timeout and redirect policy per client
type ClientKey = (Option<Duration>, bool);

/// Production [`HttpExecutor`].
///
/// Keeps one `reqwest` client per (connect timeout, redirect policy) pair so connection
/// pools are reused across calls with the same policy.
pub struct ReqwestExecutor {
    identity_pem: Option<Vec<u8>>,
    subject: Option<String>,
    clients: Mutex<HashMap<ClientKey, Client>>,
}

impl ReqwestExecutor {
    /// Engine without a client certificate
    pub fn new() -> Self {
        Self {
            identity_pem: None,
            subject: None,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Engine presenting the PEM bundle (certificate chain and private key) as client identity
    pub fn with_identity_pem(subject: impl Into<String>, pem: &[u8]) -> Result<Self, ClientError> {
        // Validate now so a bad bundle fails the credential swap, not a later call
        Identity::from_pem(pem).map_err(|e| ClientError::Credential(format!("Invalid client identity: {}", e)))?;
        Ok(Self {
            identity_pem: Some(pem.to_vec()),
            subject: Some(subject.into()),
            clients: Mutex::new(HashMap::new()),
        })
    }

    fn client_for(&self, key: ClientKey) -> Result<Client, TransportError> {
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let (connect_timeout, follow_redirects) = key;
        let mut builder = Client::builder()
            .use_rustls_tls()
            .timeout(None::<Duration>)
            .connect_timeout(connect_timeout)
            .redirect(if follow_redirects { Policy::default() } else { Policy::none() });
        if let Some(pem) = &self.identity_pem {
            let identity = Identity::from_pem(pem).map_err(|e| TransportError::IllegalState(e.to_string()))?;
            builder = builder.identity(identity);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::IllegalState(format!("Failed to build HTTP client: {}", e)))?;

        clients.insert(key, client.clone());
        Ok(client)
    }
}

impl Default for ReqwestExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpExecutor for ReqwestExecutor {
    fn execute(&self, request: &HttpRequest<'_>) -> Result<RawResponse, TransportError> {
        let config = request.config;
        let client = self.client_for((config.connect_timeout(), config.follow_redirects))?;

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut builder = client.request(method, request.url);
        for (name, value) in request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        // No separate read timeout in reqwest; the tighter of the two bounds the exchange
        let timeout = match (config.request_timeout(), config.socket_timeout()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(body) = request.body {
            builder = builder.multipart(to_form(body)?);
        }

        let response = builder.send().map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.bytes().map_err(map_reqwest_error)?;

        Ok(RawResponse { status, headers, body })
    }

    fn describe(&self) -> String {
        match &self.subject {
            Some(subject) => format!("reqwest (client certificate {})", subject),
            None => "reqwest (anonymous)".to_string(),
        }
    }
}

fn to_form(body: &MultipartBody) -> Result<multipart::Form, TransportError> {
    let mut form = multipart::Form::new();
    for part in body.parts() {
        let name = part.name().to_string();
        form = match part.content() {
            PartContent::Text(value) => form.text(name, value.clone()),
            PartContent::Bytes(bytes) => {
                form.part(name.clone(), multipart::Part::bytes(bytes.to_vec()).file_name(name))
            }
            PartContent::Spooled { file, len } => {
                let reader = file.reopen()?;
                form.part(name.clone(), multipart::Part::reader_with_length(reader, *len).file_name(name))
            }
        };
    }
    Ok(form)
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() || error.is_connect() || error.is_body() {
        TransportError::Io(error.to_string())
    } else {
        TransportError::Protocol(error.to_string())
    }
}

/// Builds a [`ReqwestExecutor`] for a session, using its certificate when it has a PEM bundle.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReqwestExecutorFactory;

impl ExecutorFactory for ReqwestExecutorFactory {
    fn build(&self, session: &Session) -> Result<Arc<dyn HttpExecutor>, ClientError> {
        let certificate = match session.certificate() {
            Some(certificate) => certificate,
            None => return Ok(Arc::new(ReqwestExecutor::new())),
        };
        certificate.check_validity(Utc::now()).map_err(ClientError::Credential)?;
        match certificate.pem() {
            Some(pem) => Ok(Arc::new(ReqwestExecutor::with_identity_pem(certificate.subject(), pem)?)),
            None => Ok(Arc::new(ReqwestExecutor::new())),
        }
    }
}
