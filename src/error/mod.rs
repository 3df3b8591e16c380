//! Error taxonomy for the DataONE client
//!
//! Errors come in two tiers:
//!
//! * [`ClientError`] - the request could not be meaningfully sent, or the response could
//!   not be interpreted. These never carry a remote error code.
//! * [`ServiceFault`] - a domain error. Either the remote service processed the request and
//!   rejected it (decoded from its XML error envelope), or the client detected a problem
//!   locally that maps onto the same taxonomy (empty path identifier, expired certificate).
//!
//! The REST gateway returns the closed sum [`DispatchError`]. Node operations convert it
//! into a per-operation error set generated by the `operation_errors!` macro,
//! so each operation's signature names exactly the kinds it can raise.

mod envelope;
mod operation;

pub use envelope::{fault_from_headers, EXCEPTION_DESCRIPTION_HEADER, EXCEPTION_DETAIL_CODE_HEADER, EXCEPTION_NAME_HEADER, EXCEPTION_PID_HEADER};
pub use operation::*;

use std::fmt;
use thiserror::Error;

/// Client-side errors: nothing here was decided by a remote service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// I/O, protocol or illegal-state failure while executing an HTTP exchange
    #[error("Transport error: {0}")]
    Transport(String),

    /// A base URL or resource URL could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Credential or key material could not be loaded or applied
    #[error("Credential error: {0}")]
    Credential(String),

    /// The locator has no Coordinating Node to hand out
    #[error("No Coordinating Node registered with the node locator")]
    NoCoordinatingNode,

    /// The locator has no entry for the given reference or base URL
    #[error("Node not found in the node locator: {0}")]
    NodeNotFound(String),

    /// A node of the other type is already registered at this base URL
    #[error("{url} is registered as a {found}, not a {expected}")]
    NodeTypeMismatch {
        url: String,
        expected: String,
        found: String,
    },

    /// Settings could not be loaded or are inconsistent
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// `cn_factory` names a constructor that was never registered
    #[error("No CN factory registered under '{0}'")]
    UnknownCNodeFactory(String),
}

/// Result alias for client-side operations
pub type ClientResult<T> = Result<T, ClientError>;

/// The closed set of DataONE exception kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    AuthenticationTimeout,
    IdentifierNotUnique,
    InsufficientResources,
    InvalidCredentials,
    InvalidRequest,
    InvalidSystemMetadata,
    InvalidToken,
    NotAuthorized,
    NotFound,
    NotImplemented,
    ServiceFailure,
    SynchronizationFailed,
    UnsupportedMetadataType,
    UnsupportedQueryType,
    UnsupportedType,
    VersionMismatch,
}

impl ErrorKind {
    /// Every kind, in declaration order
    pub const ALL: [ErrorKind; 16] = [
        ErrorKind::AuthenticationTimeout,
        ErrorKind::IdentifierNotUnique,
        ErrorKind::InsufficientResources,
        ErrorKind::InvalidCredentials,
        ErrorKind::InvalidRequest,
        ErrorKind::InvalidSystemMetadata,
        ErrorKind::InvalidToken,
        ErrorKind::NotAuthorized,
        ErrorKind::NotFound,
        ErrorKind::NotImplemented,
        ErrorKind::ServiceFailure,
        ErrorKind::SynchronizationFailed,
        ErrorKind::UnsupportedMetadataType,
        ErrorKind::UnsupportedQueryType,
        ErrorKind::UnsupportedType,
        ErrorKind::VersionMismatch,
    ];

    /// The exception name used in the `name` attribute of the error envelope
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::AuthenticationTimeout => "AuthenticationTimeout",
            ErrorKind::IdentifierNotUnique => "IdentifierNotUnique",
            ErrorKind::InsufficientResources => "InsufficientResources",
            ErrorKind::InvalidCredentials => "InvalidCredentials",
            ErrorKind::InvalidRequest => "InvalidRequest",
            ErrorKind::InvalidSystemMetadata => "InvalidSystemMetadata",
            ErrorKind::InvalidToken => "InvalidToken",
            ErrorKind::NotAuthorized => "NotAuthorized",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::NotImplemented => "NotImplemented",
            ErrorKind::ServiceFailure => "ServiceFailure",
            ErrorKind::SynchronizationFailed => "SynchronizationFailed",
            ErrorKind::UnsupportedMetadataType => "UnsupportedMetadataType",
            ErrorKind::UnsupportedQueryType => "UnsupportedQueryType",
            ErrorKind::UnsupportedType => "UnsupportedType",
            ErrorKind::VersionMismatch => "VersionMismatch",
        }
    }

    /// The HTTP status a service uses for this kind
    pub fn default_code(&self) -> u16 {
        match self {
            ErrorKind::AuthenticationTimeout => 408,
            ErrorKind::IdentifierNotUnique | ErrorKind::VersionMismatch => 409,
            ErrorKind::InsufficientResources => 413,
            ErrorKind::InvalidCredentials | ErrorKind::InvalidToken | ErrorKind::NotAuthorized => 401,
            ErrorKind::InvalidRequest
            | ErrorKind::InvalidSystemMetadata
            | ErrorKind::UnsupportedMetadataType
            | ErrorKind::UnsupportedQueryType
            | ErrorKind::UnsupportedType => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::NotImplemented => 501,
            ErrorKind::ServiceFailure => 500,
            ErrorKind::SynchronizationFailed => 0,
        }
    }

    /// Look up a kind by its exception name. Accepts fully qualified names
    /// such as `org.dataone.service.exceptions.NotFound`.
    pub fn from_name(name: &str) -> Option<Self> {
        let short = name.trim().rsplit('.').next().unwrap_or_default();
        Self::ALL.iter().copied().find(|kind| kind.name() == short)
    }

    /// Pick the kind for an error code when the envelope carries no usable name.
    pub fn from_code(code: u16) -> Self {
        match code {
            400 => ErrorKind::InvalidRequest,
            401 => ErrorKind::NotAuthorized,
            404 => ErrorKind::NotFound,
            408 => ErrorKind::AuthenticationTimeout,
            409 => ErrorKind::IdentifierNotUnique,
            413 => ErrorKind::InsufficientResources,
            501 => ErrorKind::NotImplemented,
            _ => ErrorKind::ServiceFailure,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a [`ServiceFault`] was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOrigin {
    /// Decoded from a remote service's response
    Remote,
    /// Raised by this client before or after the exchange
    Local,
}

/// A domain error with the fields of the DataONE error envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFault {
    kind: ErrorKind,
    error_code: u16,
    detail_code: String,
    description: String,
    identifier: Option<String>,
    node_id: Option<String>,
    trace_information: Option<String>,
    origin: FaultOrigin,
}

impl ServiceFault {
    /// Create a fault as a remote service would report it
    pub fn new(kind: ErrorKind, detail_code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            error_code: kind.default_code(),
            detail_code: detail_code.into(),
            description: description.into(),
            identifier: None,
            node_id: None,
            trace_information: None,
            origin: FaultOrigin::Remote,
        }
    }

    /// Create a fault the client raises on its own
    pub fn local(kind: ErrorKind, detail_code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            origin: FaultOrigin::Local,
            ..Self::new(kind, detail_code, description)
        }
    }

    pub fn with_error_code(mut self, code: u16) -> Self {
        self.error_code = code;
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_trace_information(mut self, trace: impl Into<String>) -> Self {
        self.trace_information = Some(trace.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn error_code(&self) -> u16 {
        self.error_code
    }

    pub fn detail_code(&self) -> &str {
        &self.detail_code
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    pub fn trace_information(&self) -> Option<&str> {
        self.trace_information.as_deref()
    }

    pub fn origin(&self) -> FaultOrigin {
        self.origin
    }

    /// True when the client raised this fault without the service deciding it
    pub fn is_local(&self) -> bool {
        self.origin == FaultOrigin::Local
    }

    /// Coerce this fault into another kind, keeping its detail code and recording
    /// the original kind in the description.
    pub fn recast(self, kind: ErrorKind) -> Self {
        if self.kind == kind {
            return self;
        }
        Self {
            description: format!("Unexpected {} from service: {}", self.kind, self.description),
            kind,
            error_code: kind.default_code(),
            ..self
        }
    }

    /// Render this fault as an XML error envelope
    pub fn to_xml(&self) -> String {
        envelope::to_xml(self)
    }

    /// Decode an XML error envelope
    pub fn from_xml(xml: &[u8]) -> Result<Self, crate::marshal::MarshalError> {
        envelope::from_xml(xml)
    }
}

impl fmt::Display for ServiceFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (errorCode {}, detailCode {}): {}",
            self.kind, self.error_code, self.detail_code, self.description
        )?;
        if let Some(pid) = &self.identifier {
            write!(f, " [pid {}]", pid)?;
        }
        Ok(())
    }
}

impl std::error::Error for ServiceFault {}

/// What the REST gateway returns when an exchange does not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The service answered with an error, or the client decided one locally
    #[error(transparent)]
    Service(#[from] ServiceFault),

    /// The request never reached the service, or its answer never came back
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl DispatchError {
    pub fn is_client_side(&self) -> bool {
        matches!(self, DispatchError::Client(_))
    }

    pub fn fault(&self) -> Option<&ServiceFault> {
        match self {
            DispatchError::Service(fault) => Some(fault),
            DispatchError::Client(_) => None,
        }
    }
}
