//! Client facade
//!
//! [`D1Client`] owns one gateway and, once first needed, one node locator, and hands
//! out CN and MN handles. [`D1Client::global`] is the process-wide instance built from
//! [`load_settings`].

use crate::config::{load_settings, ClientSettings};
use crate::error::{ClientError, ErrorKind, LookupError, ServiceFault};
use crate::locator::{CNodeFactories, NodeHandle, NodeLocator, SettingsNodeLocator};
use crate::node::{CNode, MNode, NodeOptions};
use crate::rest::{
    CredentialManager, D1RestClient, DefaultMultipartRestClient, ExecutorFactory, ReqwestExecutorFactory,
    StaticCredentialManager,
};
use crate::types::NodeReference;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::sync::Arc;

static GLOBAL: OnceCell<D1Client> = OnceCell::new();

/// Builder for [`D1Client`]
#[derive(Default)]
pub struct D1ClientBuilder {
    settings: ClientSettings,
    rest_client: Option<Arc<dyn D1RestClient>>,
    credential_manager: Option<Arc<dyn CredentialManager>>,
    executor_factory: Option<Arc<dyn ExecutorFactory>>,
    factories: CNodeFactories,
    locator: Option<Arc<dyn NodeLocator>>,
}

impl D1ClientBuilder {
    pub fn settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use this gateway instead of building a credential-bound one
    pub fn rest_client(mut self, rest_client: Arc<dyn D1RestClient>) -> Self {
        self.rest_client = Some(rest_client);
        self
    }

    pub fn credential_manager(mut self, manager: Arc<dyn CredentialManager>) -> Self {
        self.credential_manager = Some(manager);
        self
    }

    pub fn executor_factory(mut self, factory: Arc<dyn ExecutorFactory>) -> Self {
        self.executor_factory = Some(factory);
        self
    }

    /// Alternate CN constructors selectable through `cn_factory`
    pub fn cn_factories(mut self, factories: CNodeFactories) -> Self {
        self.factories = factories;
        self
    }

    /// Start with this locator instead of building one from the CN's node list
    pub fn node_locator(mut self, locator: Arc<dyn NodeLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn build(self) -> Result<D1Client, ClientError> {
        self.settings.validate()?;

        let rest_client = match self.rest_client {
            Some(rest_client) => rest_client,
            None => {
                let manager = match self.credential_manager {
                    Some(manager) => manager,
                    None => default_credential_manager(&self.settings)?,
                };
                let factory = self
                    .executor_factory
                    .unwrap_or_else(|| Arc::new(ReqwestExecutorFactory));
                Arc::new(DefaultMultipartRestClient::from_settings(&self.settings, manager, factory)?)
            }
        };

        Ok(D1Client {
            settings: RwLock::new(self.settings),
            rest_client,
            factories: self.factories,
            locator: RwLock::new(self.locator),
        })
    }
}

fn default_credential_manager(settings: &ClientSettings) -> Result<Arc<dyn CredentialManager>, ClientError> {
    match &settings.certificate_path {
        Some(path) => {
            let subject = settings.certificate_subject.as_deref().unwrap_or("default");
            Ok(Arc::new(StaticCredentialManager::from_pem_file(subject, path)?))
        }
        None => Ok(Arc::new(StaticCredentialManager::anonymous())),
    }
}

fn type_mismatch(base_url: &str, expected: &str, found: &NodeHandle) -> ClientError {
    let found = match found {
        NodeHandle::Member(_) => "Member Node",
        NodeHandle::Coordinating(_) => "Coordinating Node",
    };
    ClientError::NodeTypeMismatch {
        url: base_url.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

/// Entry point handing out node handles
pub struct D1Client {
    settings: RwLock<ClientSettings>,
    rest_client: Arc<dyn D1RestClient>,
    factories: CNodeFactories,
    locator: RwLock<Option<Arc<dyn NodeLocator>>>,
}

impl D1Client {
    pub fn builder() -> D1ClientBuilder {
        D1ClientBuilder::default()
    }

    /// The process-wide client, built on first use from [`load_settings`]
    pub fn global() -> Result<&'static D1Client, ClientError> {
        GLOBAL.get_or_try_init(|| D1Client::builder().settings(load_settings(None)?).build())
    }

    pub fn settings(&self) -> ClientSettings {
        self.settings.read().clone()
    }

    /// The gateway shared by every handle this client creates
    pub fn rest_client(&self) -> Arc<dyn D1RestClient> {
        Arc::clone(&self.rest_client)
    }

    /// The current locator, built from the configured CN on first use
    pub fn node_locator(&self) -> Result<Arc<dyn NodeLocator>, LookupError> {
        if let Some(locator) = self.locator.read().as_ref() {
            return Ok(Arc::clone(locator));
        }

        let mut slot = self.locator.write();
        if let Some(locator) = slot.as_ref() {
            return Ok(Arc::clone(locator));
        }
        let settings = self.settings();
        let locator: Arc<dyn NodeLocator> =
            Arc::new(SettingsNodeLocator::new(&settings, Arc::clone(&self.rest_client), &self.factories)?);
        *slot = Some(Arc::clone(&locator));
        Ok(locator)
    }

    /// Replace the locator. Handles resolved through the old one stay usable but are no
    /// longer handed out.
    pub fn set_node_locator(&self, locator: Arc<dyn NodeLocator>) {
        *self.locator.write() = Some(locator);
    }

    /// The CN selected by the current locator
    pub fn get_cn(&self) -> Result<Arc<CNode>, LookupError> {
        Ok(self.node_locator()?.get_cnode()?)
    }

    /// The CN registered at `base_url`, or a fresh handle for it
    pub fn get_cn_by_url(&self, base_url: &str) -> Result<Arc<CNode>, LookupError> {
        let locator = self.node_locator()?;
        if let Ok(handle) = locator.get_node_by_url(base_url) {
            return handle
                .as_coordinating()
                .cloned()
                .ok_or_else(|| type_mismatch(base_url, "Coordinating Node", &handle).into());
        }

        let cn = Arc::new(CNode::with_options(base_url, Arc::clone(&self.rest_client), self.node_options()));
        locator.put_node(NodeReference::new(base_url), NodeHandle::Coordinating(Arc::clone(&cn)));
        Ok(cn)
    }

    /// The MN registered at `base_url`, or a fresh handle for it
    pub fn get_mn_by_url(&self, base_url: &str) -> Result<Arc<MNode>, LookupError> {
        let locator = self.node_locator()?;
        if let Ok(handle) = locator.get_node_by_url(base_url) {
            return handle
                .as_member()
                .cloned()
                .ok_or_else(|| type_mismatch(base_url, "Member Node", &handle).into());
        }

        log::debug!("No MN registered at {}, creating a handle", base_url);
        let mn = Arc::new(MNode::with_options(base_url, Arc::clone(&self.rest_client), self.node_options()));
        locator.put_node(NodeReference::new(base_url), NodeHandle::Member(Arc::clone(&mn)));
        Ok(mn)
    }

    /// The MN registered under `reference`. A node the environment does not know is a
    /// service failure.
    pub fn get_mn(&self, reference: &NodeReference) -> Result<Arc<MNode>, LookupError> {
        let handle = self.node_locator()?.get_node(reference).map_err(|e| {
            ServiceFault::local(
                ErrorKind::ServiceFailure,
                "0",
                format!("Node {} is not known to the current environment: {}", reference, e),
            )
        })?;
        handle.as_member().cloned().ok_or_else(|| {
            ServiceFault::local(
                ErrorKind::ServiceFailure,
                "0",
                format!("Node {} is not a Member Node", reference),
            )
            .into()
        })
    }

    /// Switch environments: rebuild the locator from the node list of the CN at
    /// `base_url`. Every handle resolved so far is discarded.
    pub fn set_cn(&self, base_url: &str) -> Result<(), LookupError> {
        let settings = self.settings().with_cn_base_url(base_url);
        settings.validate()?;
        let locator = SettingsNodeLocator::new(&settings, Arc::clone(&self.rest_client), &self.factories)?;

        *self.settings.write() = settings;
        *self.locator.write() = Some(Arc::new(locator));
        log::info!("Switched CN environment to {}", base_url);
        Ok(())
    }

    fn node_options(&self) -> NodeOptions {
        NodeOptions::from_settings(&self.settings.read())
    }
}
