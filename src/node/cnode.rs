//! Coordinating Node handle

use super::{create_object, require_identifier, require_value, D1Node, NodeCore, NodeOptions};
use crate::config;
use crate::error::{
    CreateError, DescribeError, ErrorKind, IdentifierError, ListError, NodeListError, OwnershipError,
    ReplicationStatusError, ReservationError, ServiceFault, SubjectInfoError,
};
use crate::marshal;
use crate::rest::{D1RestClient, Method, MultipartBody};
use crate::types::{
    Identifier, NodeList, NodeReference, ObjectList, ObjectLocationList, ReplicationStatus, Session, SubjectInfo,
    SystemMetadata,
};
use std::io::Read;
use std::sync::Arc;

/// A Coordinating Node: registry, resolution and identity services for the federation
#[derive(Debug)]
pub struct CNode {
    core: NodeCore,
}

impl CNode {
    pub fn new(base_url: &str, rest_client: Arc<dyn D1RestClient>) -> Self {
        Self::with_options(base_url, rest_client, NodeOptions::default())
    }

    pub fn with_options(base_url: &str, rest_client: Arc<dyn D1RestClient>, options: NodeOptions) -> Self {
        Self {
            core: NodeCore::new(base_url, rest_client, options),
        }
    }

    /// The federation's node list
    pub fn list_nodes(&self) -> Result<NodeList, NodeListError> {
        let url = self.core.resource_url(&["node"], &[])?;
        let response = self.core.dispatch(None, Method::Get, &url, None, None, None)?;
        Ok(self.core.decode_with(&response, NodeList::from_xml)?)
    }

    /// Where copies of `pid` can be fetched.
    ///
    /// The CN answers with a 303 whose body is the location list; the redirect is not
    /// followed.
    pub fn resolve(&self, session: Option<&Session>, pid: &Identifier) -> Result<ObjectLocationList, DescribeError> {
        require_identifier(pid, ErrorKind::NotFound, "pid")?;
        let url = self.core.resource_url(&["resolve", pid.as_str()], &[])?;
        let response = self.core.dispatch(session, Method::Get, &url, None, None, Some(false))?;
        Ok(self
            .core
            .decode_with(&response, |xml| marshal::from_xml_rooted(xml, "objectLocationList"))?)
    }

    /// Reserve `pid` for the session's subject
    pub fn reserve_identifier(&self, session: Option<&Session>, pid: &Identifier) -> Result<Identifier, IdentifierError> {
        require_identifier(pid, ErrorKind::InvalidRequest, "pid")?;
        let url = self.core.resource_url(&["reserve"], &[])?;

        let mut body = MultipartBody::new();
        body.add_text("pid", pid.as_str());

        let response = self.core.dispatch(session, Method::Post, &url, Some(body), None, None)?;
        Ok(self.core.decode_identifier(&response)?)
    }

    /// True when `subject` holds the reservation on `pid`
    pub fn has_reservation(&self, session: Option<&Session>, subject: &str, pid: &Identifier) -> Result<bool, ReservationError> {
        require_identifier(pid, ErrorKind::NotFound, "pid")?;
        let url = self.core.resource_url(&["reserve", pid.as_str()], &[("subject", subject.to_string())])?;
        self.core.dispatch(session, Method::Get, &url, None, None, None)?;
        Ok(true)
    }

    /// Search the CN index. `query` is an encoded query string for `query_type`.
    pub fn search(&self, session: Option<&Session>, query_type: &str, query: &str) -> Result<ObjectList, ListError> {
        require_value(query_type, ErrorKind::InvalidRequest, "queryType")?;
        let mut url = self.core.resource_url(&["search", query_type, ""], &[])?;
        let query = query.trim_start_matches('?');
        if !query.is_empty() {
            url.set_query(Some(query));
        }
        let response = self.core.dispatch(session, Method::Get, &url, None, None, None)?;
        Ok(self
            .core
            .decode_with(&response, |xml| marshal::from_xml_rooted(xml, "objectList"))?)
    }

    /// Register an object directly with the CN
    pub fn create<R: Read>(
        &self,
        session: Option<&Session>,
        pid: &Identifier,
        object: R,
        sysmeta: &SystemMetadata,
    ) -> Result<Identifier, CreateError> {
        create_object(&self.core, session, pid, object, sysmeta, config::CN_CREATE_TIMEOUT)
    }

    /// Hand ownership of `pid` to `user_id`. `serial_version` guards against stale writes.
    pub fn set_rights_holder(
        &self,
        session: Option<&Session>,
        pid: &Identifier,
        user_id: &str,
        serial_version: u64,
    ) -> Result<Identifier, OwnershipError> {
        require_identifier(pid, ErrorKind::NotFound, "pid")?;
        require_value(user_id, ErrorKind::InvalidRequest, "userId")?;
        let url = self.core.resource_url(&["owner", pid.as_str()], &[])?;

        let mut body = MultipartBody::new();
        body.add_text("userId", user_id);
        body.add_text("serialVersion", serial_version.to_string());

        let response = self.core.dispatch(session, Method::Put, &url, Some(body), None, None)?;
        self.core.invalidate(pid);
        Ok(self.core.decode_identifier(&response)?)
    }

    /// Record the state of a replica of `pid` held by `node`
    pub fn set_replication_status(
        &self,
        session: Option<&Session>,
        pid: &Identifier,
        node: &NodeReference,
        status: ReplicationStatus,
        failure: Option<&ServiceFault>,
    ) -> Result<bool, ReplicationStatusError> {
        require_identifier(pid, ErrorKind::NotFound, "pid")?;
        let url = self.core.resource_url(&["replicaNotifications", pid.as_str()], &[])?;

        let mut body = MultipartBody::new();
        body.add_text("nodeRef", node.as_str());
        body.add_text("status", status.as_str());
        if let Some(failure) = failure {
            body.add_bytes("failure", failure.to_xml());
        }

        self.core.dispatch(session, Method::Put, &url, Some(body), None, None)?;
        Ok(true)
    }

    /// People and groups known under `subject`
    pub fn get_subject_info(&self, session: Option<&Session>, subject: &str) -> Result<SubjectInfo, SubjectInfoError> {
        require_value(subject, ErrorKind::NotFound, "subject")?;
        let url = self.core.resource_url(&["accounts", subject], &[])?;
        let response = self.core.dispatch(session, Method::Get, &url, None, None, None)?;
        Ok(self
            .core
            .decode_with(&response, |xml| marshal::from_xml_rooted(xml, "subjectInfo"))?)
    }
}

impl D1Node for CNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }
}
