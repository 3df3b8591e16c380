//! Node identity and the node-list discovery document

use crate::marshal::{self, MarshalError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a DataONE node, e.g. `urn:node:KNB`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeReference(String);

impl NodeReference {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeReference {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NodeReference {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The role a node plays in the federation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Member Node
    Member,
    /// Coordinating Node
    Coordinating,
    /// Monitoring node or anything this client does not address
    Other,
}

impl NodeType {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "mn" => NodeType::Member,
            "cn" => NodeType::Coordinating,
            _ => NodeType::Other,
        }
    }
}

/// One entry of a node list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    reference: NodeReference,
    node_type: NodeType,
    base_url: String,
    name: Option<String>,
    description: Option<String>,
}

impl NodeRecord {
    pub fn new(reference: impl Into<NodeReference>, node_type: NodeType, base_url: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            node_type,
            base_url: base_url.into(),
            name: None,
            description: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn reference(&self) -> &NodeReference {
        &self.reference
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Parse a single `node` XML document, as served by a node's capabilities endpoint
    pub fn from_xml(xml: &[u8]) -> Result<Self, MarshalError> {
        let raw: RawNode = marshal::from_xml_rooted(xml, "node")?;
        Ok(raw.into())
    }

    /// A CN whose description mentions "Robin" is the designated round-robin entry point.
    pub fn is_round_robin(&self) -> bool {
        self.node_type == NodeType::Coordinating
            && self
                .description
                .as_deref()
                .is_some_and(|d| d.contains("Robin") || d.contains("robin"))
    }
}

/// The node discovery document served by a CN at `/node`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeList {
    nodes: Vec<NodeRecord>,
}

#[derive(Debug, Deserialize)]
struct RawNodeList {
    #[serde(rename = "node", default)]
    nodes: Vec<RawNode>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(rename = "@type", default)]
    node_type: String,
    identifier: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "baseURL")]
    base_url: String,
}

impl From<RawNode> for NodeRecord {
    fn from(raw: RawNode) -> Self {
        Self {
            reference: NodeReference::new(raw.identifier.trim()),
            node_type: NodeType::parse(&raw.node_type),
            base_url: raw.base_url.trim().to_string(),
            name: raw.name,
            description: raw.description,
        }
    }
}

impl NodeList {
    pub fn new(nodes: Vec<NodeRecord>) -> Self {
        Self { nodes }
    }

    /// Parse a `nodeList` XML document
    pub fn from_xml(xml: &[u8]) -> Result<Self, MarshalError> {
        let raw: RawNodeList = marshal::from_xml_rooted(xml, "nodeList")?;
        Ok(Self {
            nodes: raw.nodes.into_iter().map(NodeRecord::from).collect(),
        })
    }

    /// Nodes in document order
    pub fn nodes(&self) -> &[NodeRecord] {
        &self.nodes
    }

    pub fn coordinating_nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.iter().filter(|n| n.node_type == NodeType::Coordinating)
    }

    pub fn member_nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.iter().filter(|n| n.node_type == NodeType::Member)
    }

    pub fn find(&self, reference: &NodeReference) -> Option<&NodeRecord> {
        self.nodes.iter().find(|n| &n.reference == reference)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE_LIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<d1:nodeList xmlns:d1="http://ns.dataone.org/service/types/v2.0">
  <node replicate="true" synchronize="true" type="mn" state="up">
    <identifier>urn:node:A</identifier>
    <name>Node A</name>
    <description>A member node</description>
    <baseURL>http://a/mn</baseURL>
    <services>
      <service name="MNCore" version="v1" available="true"/>
    </services>
  </node>
  <node replicate="false" synchronize="false" type="cn" state="up">
    <identifier>urn:node:B</identifier>
    <name>CN B</name>
    <description>Round Robin CN</description>
    <baseURL>http://b/cn</baseURL>
  </node>
  <node type="Monitor">
    <identifier>urn:node:M</identifier>
    <baseURL>http://m</baseURL>
  </node>
</d1:nodeList>"#;

    #[test]
    fn test_parse_node_list() {
        let list = NodeList::from_xml(NODE_LIST.as_bytes()).unwrap();
        assert_eq!(list.len(), 3);

        let a = &list.nodes()[0];
        assert_eq!(a.reference().as_str(), "urn:node:A");
        assert_eq!(a.node_type(), NodeType::Member);
        assert_eq!(a.base_url(), "http://a/mn");
        assert_eq!(a.name(), Some("Node A"));

        let b = list.find(&"urn:node:B".into()).unwrap();
        assert_eq!(b.node_type(), NodeType::Coordinating);
        assert!(b.is_round_robin());

        assert_eq!(list.nodes()[2].node_type(), NodeType::Other);
        assert_eq!(list.coordinating_nodes().count(), 1);
        assert_eq!(list.member_nodes().count(), 1);
    }

    #[test]
    fn test_round_robin_detection() {
        let cn = NodeRecord::new("urn:node:CN", NodeType::Coordinating, "http://cn");
        assert!(!cn.is_round_robin());
        assert!(cn.clone().with_description("the round robin entry").is_round_robin());
        assert!(cn.clone().with_description("Robin").is_round_robin());
        assert!(!cn.with_description("ROBIN").is_round_robin());

        let mn = NodeRecord::new("urn:node:MN", NodeType::Member, "http://mn").with_description("Round Robin");
        assert!(!mn.is_round_robin());
    }

    #[test]
    fn test_parse_single_node() {
        let xml = br#"<d1:node xmlns:d1="urn:x" type="mn"><identifier>urn:node:A</identifier><baseURL> http://a/mn </baseURL></d1:node>"#;
        let node = NodeRecord::from_xml(xml).unwrap();
        assert_eq!(node.reference().as_str(), "urn:node:A");
        assert_eq!(node.base_url(), "http://a/mn");
        assert_eq!(node.node_type(), NodeType::Member);
    }

    #[test]
    fn test_rejects_non_node_list() {
        assert!(NodeList::from_xml(b"<objectList count=\"0\" start=\"0\" total=\"0\"/>").is_err());
    }
}
