//! Locator pinned to the CN named in the client settings
//!
//! The CN is built from `cn_base_url`, either directly or by the constructor registered
//! under `cn_factory`. The rest of the registry comes from that CN's node list.

use super::{populate, NodeHandle, NodeLocator, NodeRegistry};
use crate::config::ClientSettings;
use crate::error::{ClientError, NodeListError};
use crate::node::{CNode, D1Node, NodeOptions};
use crate::rest::D1RestClient;
use crate::types::{NodeList, NodeReference};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builds a CN handle for a base URL
pub type CNodeFactory = Arc<dyn Fn(&str, Arc<dyn D1RestClient>, NodeOptions) -> Result<CNode, ClientError> + Send + Sync>;

/// Alternate CN constructors keyed by the `cn_factory` setting
#[derive(Clone, Default)]
pub struct CNodeFactories {
    factories: HashMap<String, CNodeFactory>,
}

impl CNodeFactories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_factory<F>(mut self, key: &str, factory: F) -> Self
    where
        F: Fn(&str, Arc<dyn D1RestClient>, NodeOptions) -> Result<CNode, ClientError> + Send + Sync + 'static,
    {
        self.register(key, factory);
        self
    }

    pub fn register<F>(&mut self, key: &str, factory: F)
    where
        F: Fn(&str, Arc<dyn D1RestClient>, NodeOptions) -> Result<CNode, ClientError> + Send + Sync + 'static,
    {
        self.factories.insert(key.to_string(), Arc::new(factory));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Build the CN for `settings`, honouring `cn_factory` when set
    pub fn build_cn(
        &self,
        settings: &ClientSettings,
        rest_client: Arc<dyn D1RestClient>,
        options: NodeOptions,
    ) -> Result<CNode, ClientError> {
        match settings.cn_factory.as_deref() {
            None => Ok(CNode::with_options(&settings.cn_base_url, rest_client, options)),
            Some(key) => {
                let factory = self
                    .factories
                    .get(key)
                    .ok_or_else(|| ClientError::UnknownCNodeFactory(key.to_string()))?;
                log::info!("Building CN for {} with factory '{}'", settings.cn_base_url, key);
                (factory.as_ref())(&settings.cn_base_url, rest_client, options)
            }
        }
    }
}

impl fmt::Debug for CNodeFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.factories.keys().collect();
        keys.sort();
        f.debug_struct("CNodeFactories").field("keys", &keys).finish()
    }
}

/// Locator that always hands out the configured CN
pub struct SettingsNodeLocator {
    registry: NodeRegistry,
    cn: Arc<CNode>,
}

impl SettingsNodeLocator {
    /// Build the configured CN and populate the registry from its node list
    pub fn new(
        settings: &ClientSettings,
        rest_client: Arc<dyn D1RestClient>,
        factories: &CNodeFactories,
    ) -> Result<Self, NodeListError> {
        let options = NodeOptions::from_settings(settings);
        let cn = Arc::new(factories.build_cn(settings, Arc::clone(&rest_client), options.clone())?);
        let node_list = cn.list_nodes()?;
        Ok(Self::from_node_list(cn, &node_list, rest_client, &options))
    }

    /// Pin `cn` and register the nodes of an already obtained node list
    pub fn from_node_list(
        cn: Arc<CNode>,
        node_list: &NodeList,
        rest_client: Arc<dyn D1RestClient>,
        options: &NodeOptions,
    ) -> Self {
        let registry = NodeRegistry::new();
        populate(&registry, node_list, &rest_client, options);
        log::info!(
            "Node locator pinned to CN {} with {} registered nodes",
            cn.base_url(),
            registry.len()
        );
        Self { registry, cn }
    }

    pub fn cn(&self) -> &Arc<CNode> {
        &self.cn
    }
}

impl NodeLocator for SettingsNodeLocator {
    fn get_node(&self, reference: &NodeReference) -> Result<NodeHandle, ClientError> {
        self.registry.get(reference)
    }

    fn get_node_by_url(&self, base_url: &str) -> Result<NodeHandle, ClientError> {
        self.registry.get_by_url(base_url)
    }

    fn put_node(&self, reference: NodeReference, handle: NodeHandle) {
        self.registry.put(reference, handle);
    }

    fn get_cnode(&self) -> Result<Arc<CNode>, ClientError> {
        Ok(Arc::clone(&self.cn))
    }

    fn node_references(&self) -> Vec<NodeReference> {
        self.registry.references()
    }
}
