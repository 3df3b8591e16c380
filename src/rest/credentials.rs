//! Credential-bound gateway
//!
//! [`DefaultMultipartRestClient`] behaves exactly like [`MultipartRestClient`] but is
//! bound to an injected [`CredentialManager`]. The manager exposes a generation counter
//! that changes whenever its default session does; the gateway checks it before every
//! call and rebuilds its engine when it moved. The gateway itself stays the same object,
//! so node handles holding it pick up new credentials transparently.

use super::gateway::MultipartRestClient;
use super::transport::{HttpExecutor, Method, RawResponse, RequestConfig, RestClient};
use super::{D1RestClient, MultipartBody};
use crate::config::ClientSettings;
use crate::error::{ClientError, DispatchError};
use crate::types::{Certificate, Session};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of the process's current default session
pub trait CredentialManager: Send + Sync {
    /// The session to use right now, re-derived on every call
    fn current_default_session(&self) -> Result<Session, ClientError>;

    /// Changes whenever the default session changes
    fn generation(&self) -> u64;
}

/// Builds an HTTP engine bound to a session's credentials
pub trait ExecutorFactory: Send + Sync {
    fn build(&self, session: &Session) -> Result<Arc<dyn HttpExecutor>, ClientError>;
}

/// A credential manager holding one session that callers replace explicitly.
#[derive(Debug, Default)]
pub struct StaticCredentialManager {
    session: RwLock<Session>,
    generation: AtomicU64,
}

impl StaticCredentialManager {
    pub fn new(session: Session) -> Self {
        Self {
            session: RwLock::new(session),
            generation: AtomicU64::new(0),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Session whose certificate is read from a PEM bundle on disk
    pub fn from_pem_file(subject: &str, path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let pem = std::fs::read(path)
            .map_err(|e| ClientError::Credential(format!("Failed to read certificate {}: {}", path.display(), e)))?;
        let certificate = Certificate::new(subject).with_pem(pem);
        Ok(Self::new(Session::new().with_certificate(certificate)))
    }

    /// Replace the default session and notify bound gateways
    pub fn set_session(&self, session: Session) {
        *self.session.write() = session;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl CredentialManager for StaticCredentialManager {
    fn current_default_session(&self) -> Result<Session, ClientError> {
        Ok(self.session.read().clone())
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// Gateway that follows a credential manager
pub struct DefaultMultipartRestClient {
    gateway: MultipartRestClient,
    manager: Arc<dyn CredentialManager>,
    factory: Arc<dyn ExecutorFactory>,
    seen_generation: AtomicU64,
    refresh_lock: Mutex<()>,
}

impl DefaultMultipartRestClient {
    /// Build with default settings from the manager's current session
    pub fn new(manager: Arc<dyn CredentialManager>, factory: Arc<dyn ExecutorFactory>) -> Result<Self, ClientError> {
        Self::from_settings(&ClientSettings::default(), manager, factory)
    }

    /// Build with the headers, diagnostics bound and default timeout from `settings`
    pub fn from_settings(
        settings: &ClientSettings,
        manager: Arc<dyn CredentialManager>,
        factory: Arc<dyn ExecutorFactory>,
    ) -> Result<Self, ClientError> {
        // Step 1: read the generation first so a change racing construction is not lost
        let generation = manager.generation();
        let session = manager.current_default_session()?;
        let executor = factory.build(&session)?;

        // Step 2: transport and gateway around the initial engine
        let rest_client = RestClient::new(executor)
            .with_headers(settings.header_pairs())
            .with_diagnostics_capacity(settings.diagnostics_capacity);
        let mut gateway = MultipartRestClient::new(Arc::new(rest_client));
        if let Some(timeout) = settings.default_timeout_ms {
            gateway = gateway.with_base_config(RequestConfig::with_timeout(timeout));
        }

        Ok(Self {
            gateway,
            manager,
            factory,
            seen_generation: AtomicU64::new(generation),
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn gateway(&self) -> &MultipartRestClient {
        &self.gateway
    }

    pub fn rest_client(&self) -> &Arc<RestClient> {
        self.gateway.rest_client()
    }

    /// Rebuild the engine if the manager's session changed since the last look.
    ///
    /// A failed rebuild is logged and the previous engine stays in place; it is retried
    /// only after the manager reports another change.
    pub fn refresh_if_changed(&self) {
        let current = self.manager.generation();
        if current == self.seen_generation.load(Ordering::SeqCst) {
            return;
        }

        let _guard = self.refresh_lock.lock();
        if current == self.seen_generation.load(Ordering::SeqCst) {
            return;
        }

        match self
            .manager
            .current_default_session()
            .and_then(|session| self.factory.build(&session))
        {
            Ok(executor) => {
                let description = executor.describe();
                self.gateway.rest_client().swap_executor(executor);
                log::info!("Rebuilt transport after credential change: {}", description);
            }
            Err(e) => {
                log::warn!("Credential change could not be applied, keeping previous transport: {}", e);
            }
        }
        self.seen_generation.store(current, Ordering::SeqCst);
    }
}

impl D1RestClient for DefaultMultipartRestClient {
    fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<MultipartBody>,
        timeout_ms: Option<i64>,
        follow_redirect: Option<bool>,
    ) -> Result<RawResponse, DispatchError> {
        self.refresh_if_changed();
        self.gateway.send(method, url, body, timeout_ms, follow_redirect)
    }

    fn latest_request(&self) -> Option<String> {
        self.gateway.latest_request()
    }

    fn current_executor(&self) -> Arc<dyn HttpExecutor> {
        self.refresh_if_changed();
        self.gateway.current_executor()
    }
}
