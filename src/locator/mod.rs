//! Node locators
//!
//! A locator maps node references and base URLs to live node handles and picks the
//! Coordinating Node to talk to. Lookups never construct handles; that happens when a
//! locator is built or through [`NodeLocator::put_node`].

pub mod node_list;
pub mod settings;

pub use node_list::NodeListLocator;
pub use settings::{CNodeFactories, CNodeFactory, SettingsNodeLocator};

use crate::error::ClientError;
use crate::node::{CNode, D1Node, MNode, NodeOptions};
use crate::rest::D1RestClient;
use crate::types::{NodeList, NodeReference, NodeType};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A registered node
#[derive(Debug, Clone)]
pub enum NodeHandle {
    Member(Arc<MNode>),
    Coordinating(Arc<CNode>),
}

impl NodeHandle {
    pub fn node(&self) -> &dyn D1Node {
        match self {
            NodeHandle::Member(mn) => mn.as_ref(),
            NodeHandle::Coordinating(cn) => cn.as_ref(),
        }
    }

    pub fn base_url(&self) -> &str {
        self.node().base_url()
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            NodeHandle::Member(_) => NodeType::Member,
            NodeHandle::Coordinating(_) => NodeType::Coordinating,
        }
    }

    pub fn as_member(&self) -> Option<&Arc<MNode>> {
        match self {
            NodeHandle::Member(mn) => Some(mn),
            NodeHandle::Coordinating(_) => None,
        }
    }

    pub fn as_coordinating(&self) -> Option<&Arc<CNode>> {
        match self {
            NodeHandle::Coordinating(cn) => Some(cn),
            NodeHandle::Member(_) => None,
        }
    }

    /// True when both refer to the same handle instance
    pub fn ptr_eq(&self, other: &NodeHandle) -> bool {
        match (self, other) {
            (NodeHandle::Member(a), NodeHandle::Member(b)) => Arc::ptr_eq(a, b),
            (NodeHandle::Coordinating(a), NodeHandle::Coordinating(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Registry and CN selection
pub trait NodeLocator: Send + Sync {
    /// The handle registered under `reference`
    fn get_node(&self, reference: &NodeReference) -> Result<NodeHandle, ClientError>;

    /// The handle whose base URL matches, ignoring trailing slashes
    fn get_node_by_url(&self, base_url: &str) -> Result<NodeHandle, ClientError>;

    /// Register `handle`, replacing whatever was registered under `reference`.
    ///
    /// This bypasses the locator's own construction logic; use sparingly.
    fn put_node(&self, reference: NodeReference, handle: NodeHandle);

    /// The Coordinating Node to use for the next call
    fn get_cnode(&self) -> Result<Arc<CNode>, ClientError>;

    fn node_references(&self) -> Vec<NodeReference>;
}

/// Reference → handle map; many readers, occasional writers
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: RwLock<HashMap<NodeReference, NodeHandle>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reference: &NodeReference) -> Result<NodeHandle, ClientError> {
        self.nodes
            .read()
            .get(reference)
            .cloned()
            .ok_or_else(|| ClientError::NodeNotFound(reference.to_string()))
    }

    pub fn get_by_url(&self, base_url: &str) -> Result<NodeHandle, ClientError> {
        let wanted = normalize_url(base_url);
        self.nodes
            .read()
            .iter()
            .filter(|(_, handle)| normalize_url(handle.base_url()) == wanted)
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, handle)| handle.clone())
            .ok_or_else(|| ClientError::NodeNotFound(base_url.to_string()))
    }

    /// Insert, returning the handle that was replaced
    pub fn put(&self, reference: NodeReference, handle: NodeHandle) -> Option<NodeHandle> {
        self.nodes.write().insert(reference, handle)
    }

    /// Registered references, sorted
    pub fn references(&self) -> Vec<NodeReference> {
        let mut references: Vec<_> = self.nodes.read().keys().cloned().collect();
        references.sort();
        references
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize_url(url: &str) -> &str {
    url.trim().trim_end_matches('/')
}

/// Register a handle for every Member and Coordinating node of `node_list`.
///
/// Returns the Coordinating Node handles in document order, one per reference.
pub(crate) fn populate(
    registry: &NodeRegistry,
    node_list: &NodeList,
    rest_client: &Arc<dyn D1RestClient>,
    options: &NodeOptions,
) -> Vec<(NodeReference, Arc<CNode>)> {
    let mut cn_order: Vec<NodeReference> = Vec::new();

    for record in node_list.nodes() {
        let reference = record.reference().clone();
        let options = options.clone().with_node_id(reference.clone());
        let handle = match record.node_type() {
            NodeType::Member => NodeHandle::Member(Arc::new(MNode::with_options(
                record.base_url(),
                Arc::clone(rest_client),
                options,
            ))),
            NodeType::Coordinating => {
                if !cn_order.contains(&reference) {
                    cn_order.push(reference.clone());
                }
                NodeHandle::Coordinating(Arc::new(CNode::with_options(
                    record.base_url(),
                    Arc::clone(rest_client),
                    options,
                )))
            }
            NodeType::Other => {
                log::debug!("Skipping node {} of unsupported type", reference);
                continue;
            }
        };
        if registry.put(reference.clone(), handle).is_some() {
            log::warn!("Node list lists {} more than once; keeping the last entry", reference);
        }
    }

    cn_order
        .into_iter()
        .filter_map(|reference| {
            let cn = registry.get(&reference).ok()?.as_coordinating().cloned()?;
            Some((reference, cn))
        })
        .collect()
}
