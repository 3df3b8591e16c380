//! Member Node handle

use super::{
    create_object, format_date, require_identifier, spool_error, sysmeta_xml, D1Node, NodeCore, NodeOptions,
};
use crate::config;
use crate::error::{
    CreateError, DeleteError, ErrorKind, GetError, IdentifierError, NodeListError, NotifyError, ReplicateError,
    ServiceFault, SyncFailedError, UpdateError,
};
use crate::rest::{D1RestClient, Method, MultipartBody};
use crate::types::{Identifier, NodeRecord, NodeReference, Session, SystemMetadata};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::io::Read;
use std::sync::Arc;

/// A Member Node: stores objects and serves them to clients and other nodes
#[derive(Debug)]
pub struct MNode {
    core: NodeCore,
}

impl MNode {
    pub fn new(base_url: &str, rest_client: Arc<dyn D1RestClient>) -> Self {
        Self::with_options(base_url, rest_client, NodeOptions::default())
    }

    pub fn with_options(base_url: &str, rest_client: Arc<dyn D1RestClient>, options: NodeOptions) -> Self {
        Self {
            core: NodeCore::new(base_url, rest_client, options),
        }
    }

    /// The node's own description document
    pub fn get_capabilities(&self) -> Result<NodeRecord, NodeListError> {
        let url = self.core.resource_url(&["node"], &[])?;
        let response = self.core.dispatch(None, Method::Get, &url, None, None, None)?;
        Ok(self.core.decode_with(&response, NodeRecord::from_xml)?)
    }

    pub fn create<R: Read>(
        &self,
        session: Option<&Session>,
        pid: &Identifier,
        object: R,
        sysmeta: &SystemMetadata,
    ) -> Result<Identifier, CreateError> {
        create_object(&self.core, session, pid, object, sysmeta, config::MN_CREATE_TIMEOUT)
    }

    /// Replace `pid` with `new_pid`; the node obsoletes the old object
    pub fn update<R: Read>(
        &self,
        session: Option<&Session>,
        pid: &Identifier,
        object: R,
        new_pid: &Identifier,
        sysmeta: &SystemMetadata,
    ) -> Result<Identifier, UpdateError> {
        require_identifier(pid, ErrorKind::NotFound, "pid")?;
        require_identifier(new_pid, ErrorKind::InvalidRequest, "newPid")?;
        let url = self.core.resource_url(&["object", pid.as_str()], &[])?;

        let mut body = MultipartBody::new();
        body.add_text("newPid", new_pid.as_str());
        body.add_reader("object", object).map_err(spool_error)?;
        body.add_bytes("sysmeta", sysmeta_xml(sysmeta)?);

        let timeout = self.core.timeout_for(None, Some(config::MN_UPDATE_TIMEOUT));
        let response = self.core.dispatch(session, Method::Put, &url, Some(body), timeout, None)?;
        self.core.invalidate(pid);
        Ok(self.core.decode_identifier(&response)?)
    }

    pub fn delete(&self, session: Option<&Session>, pid: &Identifier) -> Result<Identifier, DeleteError> {
        require_identifier(pid, ErrorKind::NotFound, "pid")?;
        let url = self.core.resource_url(&["object", pid.as_str()], &[])?;
        let response = self.core.dispatch(session, Method::Delete, &url, None, None, None)?;
        self.core.invalidate(pid);
        Ok(self.core.decode_identifier(&response)?)
    }

    /// Hide `pid` from searches while keeping it resolvable
    pub fn archive(&self, session: Option<&Session>, pid: &Identifier) -> Result<Identifier, DeleteError> {
        require_identifier(pid, ErrorKind::NotFound, "pid")?;
        let url = self.core.resource_url(&["archive", pid.as_str()], &[])?;
        let response = self.core.dispatch(session, Method::Put, &url, None, None, None)?;
        self.core.invalidate(pid);
        Ok(self.core.decode_identifier(&response)?)
    }

    /// Object bytes fetched for replication; logged by the node as a replica read
    pub fn get_replica(&self, session: Option<&Session>, pid: &Identifier) -> Result<Bytes, GetError> {
        require_identifier(pid, ErrorKind::NotFound, "pid")?;
        let url = self.core.resource_url(&["replica", pid.as_str()], &[])?;
        let timeout = self.core.timeout_for(None, Some(config::D1NODE_GET_TIMEOUT));
        let response = self.core.dispatch(session, Method::Get, &url, None, timeout, None)?;
        Ok(response.body)
    }

    /// Ask this node to pull a replica of the described object from `source_node`
    pub fn replicate(
        &self,
        session: Option<&Session>,
        sysmeta: &SystemMetadata,
        source_node: &NodeReference,
    ) -> Result<bool, ReplicateError> {
        let url = self.core.resource_url(&["replicate"], &[])?;

        let mut body = MultipartBody::new();
        body.add_bytes("sysmeta", sysmeta_xml(sysmeta)?);
        body.add_text("sourceNode", source_node.as_str());

        let timeout = self.core.timeout_for(None, Some(config::MN_REPLICATE_TIMEOUT));
        self.core.dispatch(session, Method::Post, &url, Some(body), timeout, None)?;
        Ok(true)
    }

    /// Tell the node its copy of `pid`'s system metadata is stale
    pub fn system_metadata_changed(
        &self,
        session: Option<&Session>,
        pid: &Identifier,
        serial_version: u64,
        date_modified: DateTime<Utc>,
    ) -> Result<bool, NotifyError> {
        require_identifier(pid, ErrorKind::InvalidRequest, "pid")?;
        let url = self.core.resource_url(&["dirtySystemMetadata"], &[])?;

        let mut body = MultipartBody::new();
        body.add_text("pid", pid.as_str());
        body.add_text("serialVersion", serial_version.to_string());
        body.add_text("dateSysMetaLastModified", format_date(date_modified));

        self.core.dispatch(session, Method::Post, &url, Some(body), None, None)?;
        self.core.invalidate(pid);
        Ok(true)
    }

    /// Report a failed synchronization attempt back to the node
    pub fn synchronization_failed(&self, session: Option<&Session>, failure: &ServiceFault) -> Result<bool, SyncFailedError> {
        let url = self.core.resource_url(&["error"], &[])?;

        let mut body = MultipartBody::new();
        body.add_bytes("message", failure.to_xml());

        self.core.dispatch(session, Method::Post, &url, Some(body), None, None)?;
        Ok(true)
    }

    /// Mint a new identifier under `scheme`, optionally starting with `fragment`
    pub fn generate_identifier(
        &self,
        session: Option<&Session>,
        scheme: &str,
        fragment: Option<&str>,
    ) -> Result<Identifier, IdentifierError> {
        super::require_value(scheme, ErrorKind::InvalidRequest, "scheme")?;
        let url = self.core.resource_url(&["generate"], &[])?;

        let mut body = MultipartBody::new();
        body.add_text("scheme", scheme);
        if let Some(fragment) = fragment {
            body.add_text("fragment", fragment);
        }

        let response = self.core.dispatch(session, Method::Post, &url, Some(body), None, None)?;
        Ok(self.core.decode_identifier(&response)?)
    }
}

impl D1Node for MNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }
}
