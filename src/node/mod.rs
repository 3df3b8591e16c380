//! Node handles
//!
//! A node handle turns typed calls into REST calls against one node's base URL. The
//! operations shared by Member and Coordinating Nodes live on the [`D1Node`] trait as
//! provided methods over a [`NodeCore`]; [`MNode`] and [`CNode`] add their own.
//!
//! Every operation returns its own error set (see [`crate::error`]), so a kind the
//! service was not supposed to raise arrives as `ServiceFailure`.

pub mod cache;
pub mod cnode;
pub mod mnode;

pub use cache::{CacheKey, ObjectCache};
pub use cnode::CNode;
pub use mnode::MNode;

use crate::config::{self, ClientSettings};
use crate::error::{
    AuthorizationError, ChecksumError, ClientError, CreateError, DescribeError, DispatchError, ErrorKind, GetError,
    ListError, PingError, QueryError, ServiceFault,
};
use crate::marshal::{self, MarshalError};
use crate::rest::{D1RestClient, Method, MultipartBody, RawResponse};
use crate::types::object::IdentifierDocument;
use crate::types::{
    Checksum, DescribeResponse, Identifier, Log, NodeReference, ObjectList, Permission, Session, SystemMetadata,
};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::sync::Arc;

/// REST API version prefix of every resource path
pub const API_VERSION: &str = "v2";

// Headers describing an object in a HEAD response
pub const FORMAT_ID_HEADER: &str = "DataONE-formatId";
pub const CHECKSUM_HEADER: &str = "DataONE-Checksum";
pub const SERIAL_VERSION_HEADER: &str = "DataONE-SerialVersion";

/// Per-handle options beyond base URL and gateway
#[derive(Debug, Clone, Default)]
pub struct NodeOptions {
    pub node_id: Option<NodeReference>,
    pub default_session: Option<Session>,
    /// Named per-operation timeouts in milliseconds
    pub timeouts: HashMap<String, i64>,
    /// Capacity of the local object cache; `None` disables it
    pub cache_capacity: Option<usize>,
}

impl NodeOptions {
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            node_id: None,
            default_session: None,
            timeouts: settings.timeouts.clone(),
            cache_capacity: settings.local_cache_enabled.then_some(settings.local_cache_capacity),
        }
    }

    pub fn with_node_id(mut self, node_id: impl Into<NodeReference>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_default_session(mut self, session: Session) -> Self {
        self.default_session = Some(session);
        self
    }

    pub fn with_timeout(mut self, property: &str, timeout_ms: i64) -> Self {
        self.timeouts.insert(property.to_string(), timeout_ms);
        self
    }

    pub fn with_cache(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }
}

/// Filters for listing objects and log records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub format_id: Option<String>,
    pub identifier: Option<String>,
    pub event: Option<String>,
    pub start: Option<u32>,
    pub count: Option<u32>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range(mut self, from_date: DateTime<Utc>, to_date: DateTime<Utc>) -> Self {
        self.from_date = Some(from_date);
        self.to_date = Some(to_date);
        self
    }

    pub fn with_format_id(mut self, format_id: &str) -> Self {
        self.format_id = Some(format_id.to_string());
        self
    }

    pub fn with_identifier(mut self, identifier: &str) -> Self {
        self.identifier = Some(identifier.to_string());
        self
    }

    pub fn with_event(mut self, event: &str) -> Self {
        self.event = Some(event.to_string());
        self
    }

    pub fn with_page(mut self, start: u32, count: u32) -> Self {
        self.start = Some(start);
        self.count = Some(count);
        self
    }

    fn object_params(&self) -> Vec<(&'static str, String)> {
        let mut params = self.date_params();
        push_param(&mut params, "formatId", self.format_id.clone());
        push_param(&mut params, "identifier", self.identifier.clone());
        self.push_paging(&mut params);
        params
    }

    fn log_params(&self) -> Vec<(&'static str, String)> {
        let mut params = self.date_params();
        push_param(&mut params, "event", self.event.clone());
        push_param(&mut params, "idFilter", self.identifier.clone());
        self.push_paging(&mut params);
        params
    }

    fn date_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        push_param(&mut params, "fromDate", self.from_date.map(format_date));
        push_param(&mut params, "toDate", self.to_date.map(format_date));
        params
    }

    fn push_paging(&self, params: &mut Vec<(&'static str, String)>) {
        push_param(params, "start", self.start.map(|v| v.to_string()));
        push_param(params, "count", self.count.map(|v| v.to_string()));
    }
}

fn push_param(params: &mut Vec<(&'static str, String)>, name: &'static str, value: Option<String>) {
    if let Some(value) = value {
        params.push((name, value));
    }
}

pub(crate) fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// State and dispatch shared by every node handle.
pub struct NodeCore {
    base_url: String,
    node_id: Option<NodeReference>,
    rest_client: Arc<dyn D1RestClient>,
    default_session: Option<Session>,
    timeouts: HashMap<String, i64>,
    cache: Option<ObjectCache>,
}

impl NodeCore {
    pub fn new(base_url: &str, rest_client: Arc<dyn D1RestClient>, options: NodeOptions) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            node_id: options.node_id,
            rest_client,
            default_session: options.default_session,
            timeouts: options.timeouts,
            cache: options.cache_capacity.map(ObjectCache::new),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn node_id(&self) -> Option<&NodeReference> {
        self.node_id.as_ref()
    }

    pub fn rest_client(&self) -> &Arc<dyn D1RestClient> {
        &self.rest_client
    }

    pub fn default_session(&self) -> Option<&Session> {
        self.default_session.as_ref()
    }

    pub fn cache(&self) -> Option<&ObjectCache> {
        self.cache.as_ref()
    }

    /// Cache scope for a call: the subject of the effective session
    pub fn cache_key(&self, session: Option<&Session>, pid: &Identifier) -> CacheKey {
        let subject = session.or(self.default_session.as_ref()).and_then(Session::subject);
        CacheKey::new(subject, pid)
    }

    /// Pick the gateway for a call.
    ///
    /// Without a session the handle's default applies. A session carrying its own
    /// gateway overrides the handle's. A certificate outside its validity window is
    /// rejected before anything is sent.
    pub fn rest_client_for(&self, session: Option<&Session>) -> Result<Arc<dyn D1RestClient>, ServiceFault> {
        let session = match session.or(self.default_session.as_ref()) {
            Some(session) => session,
            None => return Ok(Arc::clone(&self.rest_client)),
        };

        if let Some(certificate) = session.certificate() {
            certificate
                .check_validity(Utc::now())
                .map_err(|reason| ServiceFault::local(ErrorKind::ServiceFailure, "0", reason))?;
        }

        Ok(session
            .rest_client()
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.rest_client)))
    }

    /// `<base>/v2/<segments...>[?query]`, each segment percent-encoded
    pub fn resource_url(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .push(API_VERSION)
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    /// Explicit override, else the named property, else none
    pub fn timeout_for(&self, explicit: Option<i64>, property: Option<&str>) -> Option<i64> {
        explicit.or_else(|| property.and_then(|p| self.timeouts.get(p).copied()))
    }

    pub fn dispatch(
        &self,
        session: Option<&Session>,
        method: Method,
        url: &Url,
        body: Option<MultipartBody>,
        timeout_ms: Option<i64>,
        follow_redirect: Option<bool>,
    ) -> Result<RawResponse, DispatchError> {
        let rest_client = match self.rest_client_for(session) {
            Ok(rest_client) => rest_client,
            Err(fault) => {
                if let Some(body) = body {
                    body.release();
                }
                return Err(fault.into());
            }
        };
        rest_client.send(method, url.as_str(), body, timeout_ms, follow_redirect)
    }

    /// Deserialize a successful response body
    pub fn decode<T: DeserializeOwned>(&self, response: &RawResponse) -> Result<T, ServiceFault> {
        self.decode_with(response, marshal::from_xml)
    }

    pub fn decode_with<T, F>(&self, response: &RawResponse, parse: F) -> Result<T, ServiceFault>
    where
        F: FnOnce(&[u8]) -> Result<T, MarshalError>,
    {
        parse(&response.body).map_err(|e| {
            ServiceFault::local(
                ErrorKind::ServiceFailure,
                "0",
                format!("Could not deserialize the response from {}: {}", self.base_url, e),
            )
        })
    }

    pub fn decode_identifier(&self, response: &RawResponse) -> Result<Identifier, ServiceFault> {
        let document: IdentifierDocument =
            self.decode_with(response, |xml| marshal::from_xml_rooted(xml, "identifier"))?;
        Ok(Identifier::new(document.value.trim()))
    }

    fn invalidate(&self, pid: &Identifier) {
        if let Some(cache) = &self.cache {
            cache.invalidate(pid);
        }
    }
}

impl fmt::Debug for NodeCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCore")
            .field("base_url", &self.base_url)
            .field("node_id", &self.node_id)
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

/// Refuse blank identifiers before anything is sent
pub(crate) fn require_identifier(pid: &Identifier, kind: ErrorKind, name: &str) -> Result<(), ServiceFault> {
    require_value(pid.as_str(), kind, name)
}

pub(crate) fn require_value(value: &str, kind: ErrorKind, name: &str) -> Result<(), ServiceFault> {
    if value.trim().is_empty() {
        return Err(ServiceFault::local(kind, "0", format!("'{}' cannot be null or empty", name)));
    }
    Ok(())
}

pub(crate) fn sysmeta_xml(sysmeta: &SystemMetadata) -> Result<String, ServiceFault> {
    marshal::to_xml(sysmeta).map_err(|e| ServiceFault::local(ErrorKind::ServiceFailure, "0", e.to_string()))
}

pub(crate) fn spool_error(e: std::io::Error) -> ClientError {
    ClientError::Transport(format!("Failed to spool request body: {}", e))
}

/// POST `/object` with `pid`, `object` and `sysmeta` parts; shared by MN and CN
pub(crate) fn create_object<R: Read>(
    core: &NodeCore,
    session: Option<&Session>,
    pid: &Identifier,
    object: R,
    sysmeta: &SystemMetadata,
    timeout_property: &str,
) -> Result<Identifier, CreateError> {
    require_identifier(pid, ErrorKind::InvalidRequest, "pid")?;
    let url = core.resource_url(&["object"], &[])?;

    let mut body = MultipartBody::new();
    body.add_text("pid", pid.as_str());
    body.add_reader("object", object).map_err(spool_error)?;
    body.add_bytes("sysmeta", sysmeta_xml(sysmeta)?);

    let timeout = core.timeout_for(None, Some(timeout_property));
    let response = core.dispatch(session, Method::Post, &url, Some(body), timeout, None)?;
    Ok(core.decode_identifier(&response)?)
}

/// Operations every node answers
pub trait D1Node: Send + Sync {
    fn core(&self) -> &NodeCore;

    fn base_url(&self) -> &str {
        self.core().base_url()
    }

    fn node_id(&self) -> Option<&NodeReference> {
        self.core().node_id()
    }

    /// Latest request this handle's gateway made on the calling thread
    fn latest_request(&self) -> Option<String> {
        self.core().rest_client().latest_request()
    }

    /// Liveness check; returns the node's clock from the `Date` header
    fn ping(&self) -> Result<DateTime<Utc>, PingError> {
        let core = self.core();
        let url = core.resource_url(&["monitor", "ping"], &[])?;
        let response = core.dispatch(None, Method::Get, &url, None, None, None)?;

        response
            .header("Date")
            .and_then(|date| DateTime::parse_from_rfc2822(date).ok())
            .map(|date| date.with_timezone(&Utc))
            .ok_or_else(|| {
                ServiceFault::local(ErrorKind::ServiceFailure, "0", "Ping response carried no usable Date header").into()
            })
    }

    fn get(&self, session: Option<&Session>, pid: &Identifier) -> Result<Bytes, GetError> {
        self.get_with_timeout(session, pid, None)
    }

    /// `get` with an explicit timeout taking precedence over the configured one
    fn get_with_timeout(&self, session: Option<&Session>, pid: &Identifier, timeout_ms: Option<i64>) -> Result<Bytes, GetError> {
        let core = self.core();
        require_identifier(pid, ErrorKind::NotFound, "pid")?;
        let rest_client = core.rest_client_for(session)?;
        let key = core.cache_key(session, pid);
        if let Some(bytes) = core.cache().and_then(|cache| cache.object(&key)) {
            return Ok(bytes);
        }

        let url = core.resource_url(&["object", pid.as_str()], &[])?;
        let timeout = core.timeout_for(timeout_ms, Some(config::D1NODE_GET_TIMEOUT));
        let response = rest_client.send(Method::Get, url.as_str(), None, timeout, None)?;

        if let Some(cache) = core.cache() {
            cache.put_object(key, response.body.clone());
        }
        Ok(response.body)
    }

    fn get_system_metadata(&self, session: Option<&Session>, pid: &Identifier) -> Result<SystemMetadata, DescribeError> {
        let core = self.core();
        require_identifier(pid, ErrorKind::NotFound, "pid")?;
        let rest_client = core.rest_client_for(session)?;
        let key = core.cache_key(session, pid);
        if let Some(sysmeta) = core.cache().and_then(|cache| cache.system_metadata(&key)) {
            return Ok(sysmeta);
        }

        let url = core.resource_url(&["meta", pid.as_str()], &[])?;
        let response = rest_client.send(Method::Get, url.as_str(), None, None, None)?;
        let sysmeta: SystemMetadata =
            core.decode_with(&response, |xml| marshal::from_xml_rooted(xml, "systemMetadata"))?;

        if let Some(cache) = core.cache() {
            cache.put_system_metadata(key, sysmeta.clone());
        }
        Ok(sysmeta)
    }

    /// HEAD on the object; the description comes from response headers
    fn describe(&self, session: Option<&Session>, pid: &Identifier) -> Result<DescribeResponse, DescribeError> {
        let core = self.core();
        require_identifier(pid, ErrorKind::NotFound, "pid")?;
        let url = core.resource_url(&["object", pid.as_str()], &[])?;
        let response = core.dispatch(session, Method::Head, &url, None, None, None)?;

        let missing = |header: &str| {
            ServiceFault::local(
                ErrorKind::ServiceFailure,
                "0",
                format!("describe response for {} has no {} header", pid, header),
            )
        };
        let format_id = response.header(FORMAT_ID_HEADER).ok_or_else(|| missing(FORMAT_ID_HEADER))?;
        let checksum = response
            .header(CHECKSUM_HEADER)
            .and_then(|value| value.split_once(','))
            .map(|(algorithm, value)| Checksum::new(algorithm.trim(), value.trim()))
            .ok_or_else(|| missing(CHECKSUM_HEADER))?;

        Ok(DescribeResponse {
            format_id: format_id.to_string(),
            content_length: response
                .header("Content-Length")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
            last_modified: response.header("Last-Modified").map(str::to_string),
            checksum,
            serial_version: response.header(SERIAL_VERSION_HEADER).and_then(|v| v.trim().parse().ok()),
        })
    }

    fn get_checksum(&self, session: Option<&Session>, pid: &Identifier, algorithm: Option<&str>) -> Result<Checksum, ChecksumError> {
        let core = self.core();
        require_identifier(pid, ErrorKind::NotFound, "pid")?;
        let query: Vec<(&str, String)> = algorithm.map(|a| ("checksumAlgorithm", a.to_string())).into_iter().collect();
        let url = core.resource_url(&["checksum", pid.as_str()], &query)?;
        let response = core.dispatch(session, Method::Get, &url, None, None, None)?;
        Ok(core.decode_with(&response, |xml| marshal::from_xml_rooted(xml, "checksum"))?)
    }

    fn list_objects(&self, session: Option<&Session>, query: &ListQuery) -> Result<ObjectList, ListError> {
        let core = self.core();
        let url = core.resource_url(&["object"], &query.object_params())?;
        let response = core.dispatch(session, Method::Get, &url, None, None, None)?;
        Ok(core.decode_with(&response, |xml| marshal::from_xml_rooted(xml, "objectList"))?)
    }

    /// True when the session holds `permission` on `pid`; a refusal is `NotAuthorized`
    fn is_authorized(&self, session: Option<&Session>, pid: &Identifier, permission: Permission) -> Result<bool, AuthorizationError> {
        let core = self.core();
        require_identifier(pid, ErrorKind::NotFound, "pid")?;
        let url = core.resource_url(&["isAuthorized", pid.as_str()], &[("action", permission.as_str().to_string())])?;
        core.dispatch(session, Method::Get, &url, None, None, None)?;
        Ok(true)
    }

    /// Run `query` (an already encoded query string such as `q=id:abc&rows=5`)
    /// against a query engine. The engine's response is returned as is.
    fn query(&self, session: Option<&Session>, engine: &str, query: &str) -> Result<Bytes, QueryError> {
        let core = self.core();
        require_value(engine, ErrorKind::InvalidRequest, "queryEngine")?;
        let mut url = core.resource_url(&["query", engine, ""], &[])?;
        let query = query.trim_start_matches('?');
        if !query.is_empty() {
            url.set_query(Some(query));
        }
        let response = core.dispatch(session, Method::Get, &url, None, None, None)?;
        Ok(response.body)
    }

    fn get_log_records(&self, session: Option<&Session>, query: &ListQuery) -> Result<Log, ListError> {
        let core = self.core();
        let url = core.resource_url(&["log"], &query.log_params())?;
        let response = core.dispatch(session, Method::Get, &url, None, None, None)?;
        Ok(core.decode_with(&response, |xml| marshal::from_xml_rooted(xml, "log"))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::HttpExecutor;

    struct Unused;

    impl D1RestClient for Unused {
        fn send(
            &self,
            _method: Method,
            _url: &str,
            _body: Option<MultipartBody>,
            _timeout_ms: Option<i64>,
            _follow_redirect: Option<bool>,
        ) -> Result<RawResponse, DispatchError> {
            Err(ClientError::Transport("not connected".into()).into())
        }

        fn latest_request(&self) -> Option<String> {
            None
        }

        fn current_executor(&self) -> Arc<dyn HttpExecutor> {
            unimplemented!("not used in these tests")
        }
    }

    fn core(base_url: &str) -> NodeCore {
        NodeCore::new(base_url, Arc::new(Unused), NodeOptions::default().with_timeout("op.timeout", 10))
    }

    #[test]
    fn test_resource_url_escapes_segments() {
        let url = core("https://mn.example.org/knb/d1/mn/").resource_url(&["object", "doi:10.5063/F1 x/y"], &[]).unwrap();
        assert_eq!(url.as_str(), "https://mn.example.org/knb/d1/mn/v2/object/doi:10.5063%2FF1%20x%2Fy");
    }

    #[test]
    fn test_resource_url_query() {
        let url = core("http://a").resource_url(&["object"], &[("formatId", "text/csv".to_string())]).unwrap();
        assert_eq!(url.as_str(), "http://a/v2/object?formatId=text%2Fcsv");
    }

    #[test]
    fn test_bad_base_url() {
        assert!(matches!(core("not a url").resource_url(&["node"], &[]), Err(ClientError::InvalidUrl(_))));
    }

    #[test]
    fn test_timeout_precedence() {
        let core = core("http://a");
        assert_eq!(core.timeout_for(Some(5), Some("op.timeout")), Some(5));
        assert_eq!(core.timeout_for(None, Some("op.timeout")), Some(10));
        assert_eq!(core.timeout_for(None, Some("other")), None);
        assert_eq!(core.timeout_for(None, None), None);
    }

    #[test]
    fn test_list_params() {
        let from = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z").unwrap().with_timezone(&Utc);
        let query = ListQuery::new().with_range(from, from).with_identifier("p").with_page(10, 5);
        let params = query.log_params();
        assert!(params.contains(&("fromDate", "2024-01-02T03:04:05.000Z".to_string())));
        assert!(params.contains(&("idFilter", "p".to_string())));
        assert!(params.contains(&("count", "5".to_string())));
        assert!(query.object_params().contains(&("identifier", "p".to_string())));
    }
}
