//! Locator built from a node-list document

use super::{populate, NodeHandle, NodeLocator, NodeRegistry};
use crate::error::ClientError;
use crate::node::{CNode, NodeOptions};
use crate::rest::D1RestClient;
use crate::types::{NodeList, NodeReference};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Locator over every node of a node list, rotating among its Coordinating Nodes.
///
/// The rotation list is fixed at construction. When a CN is designated round-robin
/// (its description mentions "Robin"), it is the only entry; otherwise every CN is, in
/// document order. Selection walks the list with an atomic counter.
pub struct NodeListLocator {
    registry: NodeRegistry,
    rotation: Vec<Arc<CNode>>,
    next: AtomicUsize,
}

impl NodeListLocator {
    pub fn new(node_list: &NodeList, rest_client: Arc<dyn D1RestClient>) -> Self {
        Self::with_options(node_list, rest_client, &NodeOptions::default())
    }

    pub fn with_options(node_list: &NodeList, rest_client: Arc<dyn D1RestClient>, options: &NodeOptions) -> Self {
        let registry = NodeRegistry::new();
        let cnodes = populate(&registry, node_list, &rest_client, options);

        // The last record of a reference is the one registered
        let mut round_robin: HashMap<&NodeReference, bool> = HashMap::new();
        for record in node_list.coordinating_nodes() {
            round_robin.insert(record.reference(), record.is_round_robin());
        }

        // Several CNs may claim the round-robin role; the smallest reference wins
        let mut designated: Vec<NodeReference> = cnodes
            .iter()
            .filter(|(reference, _)| round_robin.get(reference).copied().unwrap_or(false))
            .map(|(reference, _)| reference.clone())
            .collect();
        designated.sort();
        designated.dedup();
        if designated.len() > 1 {
            log::warn!(
                "{} CNs are marked round robin ({:?}); using {}",
                designated.len(),
                designated.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
                designated[0]
            );
        }

        let rotation: Vec<Arc<CNode>> = match designated.first() {
            Some(chosen) => {
                log::info!("Using round-robin CN {}", chosen);
                cnodes
                    .into_iter()
                    .filter(|(reference, _)| reference == chosen)
                    .map(|(_, cn)| cn)
                    .collect()
            }
            None => cnodes.into_iter().map(|(_, cn)| cn).collect(),
        };

        log::info!(
            "Node locator holds {} nodes, {} CN(s) in rotation",
            registry.len(),
            rotation.len()
        );

        Self {
            registry,
            rotation,
            next: AtomicUsize::new(0),
        }
    }

    /// CN handles in selection order
    pub fn rotation(&self) -> &[Arc<CNode>] {
        &self.rotation
    }
}

impl NodeLocator for NodeListLocator {
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
        match self.rotation.len() {
            0 => Err(ClientError::NoCoordinatingNode),
            1 => Ok(Arc::clone(&self.rotation[0])),
            n => {
                let index = self.next.fetch_add(1, Ordering::Relaxed) % n;
                Ok(Arc::clone(&self.rotation[index]))
            }
        }
    }

    fn node_references(&self) -> Vec<NodeReference> {
        self.registry.references()
    }
}
