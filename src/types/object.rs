//! Typed results returned by the node surface
//!
//! These mirror the service XML documents closely enough for a client to act on them.
//! Fields the client never reads are left out; the deserializer skips them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Persistent identifier of an object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank identifiers can never be sent as a path segment
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// `<identifier>` response document
#[derive(Debug, Deserialize)]
pub(crate) struct IdentifierDocument {
    #[serde(rename = "$text")]
    pub value: String,
}

/// Checksum with its algorithm, e.g. `MD5`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    #[serde(rename = "@algorithm")]
    pub algorithm: String,
    #[serde(rename = "$text")]
    pub value: String,
}

impl Checksum {
    pub fn new(algorithm: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            value: value.into(),
        }
    }
}

/// System metadata for an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "systemMetadata", rename_all = "camelCase")]
pub struct SystemMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_version: Option<u64>,
    pub identifier: Identifier,
    pub format_id: String,
    pub size: u64,
    pub checksum: Checksum,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rights_holder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obsoletes: Option<Identifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obsoleted_by: Option<Identifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_uploaded: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_sys_metadata_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_member_node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authoritative_member_node: Option<String>,
}

impl SystemMetadata {
    pub fn new(identifier: impl Into<Identifier>, format_id: impl Into<String>, size: u64, checksum: Checksum) -> Self {
        Self {
            serial_version: None,
            identifier: identifier.into(),
            format_id: format_id.into(),
            size,
            checksum,
            submitter: None,
            rights_holder: None,
            obsoletes: None,
            obsoleted_by: None,
            archived: None,
            date_uploaded: None,
            date_sys_metadata_modified: None,
            origin_member_node: None,
            authoritative_member_node: None,
        }
    }
}

/// One entry of an [`ObjectList`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    pub identifier: Identifier,
    pub format_id: String,
    pub checksum: Checksum,
    #[serde(default)]
    pub date_sys_metadata_modified: Option<String>,
    pub size: u64,
}

/// A page of object listings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObjectList {
    #[serde(rename = "@count")]
    pub count: u32,
    #[serde(rename = "@start")]
    pub start: u32,
    #[serde(rename = "@total")]
    pub total: u32,
    #[serde(rename = "objectInfo", default)]
    pub objects: Vec<ObjectInfo>,
}

/// Where replicas of an object live, as returned by CN `resolve`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObjectLocationList {
    pub identifier: Identifier,
    #[serde(rename = "objectLocation", default)]
    pub locations: Vec<ObjectLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObjectLocation {
    #[serde(rename = "nodeIdentifier")]
    pub node_identifier: String,
    #[serde(rename = "baseURL")]
    pub base_url: String,
    #[serde(default)]
    pub version: Vec<String>,
    pub url: String,
    #[serde(default)]
    pub preference: Option<i32>,
}

/// Header-derived description of an object, returned by `describe` (HTTP HEAD)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeResponse {
    pub format_id: String,
    pub content_length: u64,
    pub last_modified: Option<String>,
    pub checksum: Checksum,
    pub serial_version: Option<u64>,
}

/// One access-log entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub entry_id: String,
    pub identifier: Identifier,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    pub event: String,
    pub date_logged: String,
    #[serde(default)]
    pub node_identifier: Option<String>,
}

/// A page of access-log entries
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Log {
    #[serde(rename = "@count")]
    pub count: u32,
    #[serde(rename = "@start")]
    pub start: u32,
    #[serde(rename = "@total")]
    pub total: u32,
    #[serde(rename = "logEntry", default)]
    pub entries: Vec<LogEntry>,
}

/// Identity information about a subject
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct SubjectInfo {
    #[serde(rename = "person", default)]
    pub persons: Vec<Person>,
    #[serde(rename = "group", default)]
    pub groups: Vec<Group>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub subject: String,
    #[serde(default)]
    pub given_name: Vec<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub email: Vec<String>,
    #[serde(default)]
    pub verified: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub subject: String,
    #[serde(default)]
    pub group_name: Option<String>,
}

/// Access level checked by `is_authorized`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read,
    Write,
    ChangePermission,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::ChangePermission => "changePermission",
        }
    }
}

/// Replica state reported to a CN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationStatus {
    Queued,
    Requested,
    Completed,
    Failed,
    Invalidated,
}

impl ReplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicationStatus::Queued => "queued",
            ReplicationStatus::Requested => "requested",
            ReplicationStatus::Completed => "completed",
            ReplicationStatus::Failed => "failed",
            ReplicationStatus::Invalidated => "invalidated",
        }
    }
}
