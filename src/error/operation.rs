//! Per-operation error sets
//!
//! Each node operation declares the exception kinds it may raise. A fault of an
//! undeclared kind is coerced to `ServiceFailure`, which every set must declare.

use super::{ClientError, DispatchError, ErrorKind, ServiceFault};

macro_rules! operation_errors {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident { $($kind:ident),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        $vis enum $name {
            $(
                #[error(transparent)]
                $kind(ServiceFault),
            )+
            #[error(transparent)]
            Client(#[from] ClientError),
        }

        impl From<ServiceFault> for $name {
            #[allow(unreachable_patterns)]
            fn from(fault: ServiceFault) -> Self {
                match fault.kind() {
                    $(ErrorKind::$kind => $name::$kind(fault),)+
                    _ => $name::ServiceFailure(fault.recast(ErrorKind::ServiceFailure)),
                }
            }
        }

        impl From<DispatchError> for $name {
            fn from(error: DispatchError) -> Self {
                match error {
                    DispatchError::Service(fault) => fault.into(),
                    DispatchError::Client(error) => $name::Client(error),
                }
            }
        }

        impl $name {
            /// Kinds this operation may raise besides client-side errors
            pub const DECLARED: &'static [ErrorKind] = &[$(ErrorKind::$kind),+];

            /// The domain fault, if this is not a client-side error
            pub fn fault(&self) -> Option<&ServiceFault> {
                match self {
                    $($name::$kind(fault) => Some(fault),)+
                    $name::Client(_) => None,
                }
            }

            pub fn kind(&self) -> Option<ErrorKind> {
                self.fault().map(ServiceFault::kind)
            }

            pub fn is_client_side(&self) -> bool {
                matches!(self, $name::Client(_))
            }
        }
    };
}

operation_errors! {
    /// Errors raised by `ping`
    pub enum PingError { NotImplemented, ServiceFailure, InsufficientResources }
}

operation_errors! {
    /// Errors raised when retrieving object bytes (`get`, `get_replica`)
    pub enum GetError { InvalidToken, NotAuthorized, NotImplemented, ServiceFailure, NotFound, InsufficientResources }
}

operation_errors! {
    /// Errors raised by metadata lookups (`get_system_metadata`, `describe`, `resolve`)
    pub enum DescribeError { InvalidToken, NotAuthorized, NotImplemented, ServiceFailure, NotFound }
}

operation_errors! {
    /// Errors raised by `get_checksum`
    pub enum ChecksumError { InvalidRequest, InvalidToken, NotAuthorized, NotImplemented, ServiceFailure, NotFound }
}

operation_errors! {
    /// Errors raised by listings (`list_objects`, `get_log_records`, `search`)
    pub enum ListError { InvalidRequest, InvalidToken, NotAuthorized, NotImplemented, ServiceFailure }
}

operation_errors! {
    /// Errors raised by `is_authorized`
    pub enum AuthorizationError { ServiceFailure, InvalidRequest, InvalidToken, NotFound, NotAuthorized, NotImplemented }
}

operation_errors! {
    /// Errors raised by `query`
    pub enum QueryError { InvalidToken, ServiceFailure, NotAuthorized, InvalidRequest, NotImplemented, NotFound }
}

operation_errors! {
    /// Errors raised by `create`
    pub enum CreateError {
        IdentifierNotUnique,
        InsufficientResources,
        InvalidRequest,
        InvalidSystemMetadata,
        InvalidToken,
        NotAuthorized,
        NotImplemented,
        ServiceFailure,
        UnsupportedType,
    }
}

operation_errors! {
    /// Errors raised by `update`
    pub enum UpdateError {
        IdentifierNotUnique,
        InsufficientResources,
        InvalidRequest,
        InvalidSystemMetadata,
        InvalidToken,
        NotAuthorized,
        NotImplemented,
        ServiceFailure,
        UnsupportedType,
        NotFound,
    }
}

operation_errors! {
    /// Errors raised by `delete` and `archive`
    pub enum DeleteError { InvalidToken, ServiceFailure, NotAuthorized, NotFound, NotImplemented }
}

operation_errors! {
    /// Errors raised by `replicate`
    pub enum ReplicateError {
        NotImplemented,
        ServiceFailure,
        NotAuthorized,
        InvalidRequest,
        InvalidToken,
        InsufficientResources,
        UnsupportedType,
    }
}

operation_errors! {
    /// Errors raised by `system_metadata_changed`
    pub enum NotifyError { InvalidToken, ServiceFailure, NotAuthorized, NotImplemented, InvalidRequest }
}

operation_errors! {
    /// Errors raised by `synchronization_failed`
    pub enum SyncFailedError { InvalidToken, NotAuthorized, NotImplemented, ServiceFailure }
}

operation_errors! {
    /// Errors raised when minting or reserving identifiers
    pub enum IdentifierError { InvalidToken, ServiceFailure, NotAuthorized, NotImplemented, InvalidRequest, IdentifierNotUnique }
}

operation_errors! {
    /// Errors raised by `has_reservation`
    pub enum ReservationError { InvalidToken, ServiceFailure, NotFound, NotAuthorized, NotImplemented, IdentifierNotUnique }
}

operation_errors! {
    /// Errors raised by `set_rights_holder`
    pub enum OwnershipError { InvalidToken, ServiceFailure, NotFound, NotAuthorized, NotImplemented, InvalidRequest, VersionMismatch }
}

operation_errors! {
    /// Errors raised by `set_replication_status`
    pub enum ReplicationStatusError { ServiceFailure, NotImplemented, InvalidToken, NotAuthorized, InvalidRequest, NotFound }
}

operation_errors! {
    /// Errors raised by `get_subject_info`
    pub enum SubjectInfoError { ServiceFailure, InvalidRequest, NotAuthorized, NotImplemented, NotFound, InvalidToken }
}

operation_errors! {
    /// Errors raised when fetching node documents (`list_nodes`, `get_capabilities`)
    pub enum NodeListError { NotImplemented, ServiceFailure }
}

operation_errors! {
    /// Errors raised by the client facade when resolving node handles
    pub enum LookupError { NotImplemented, ServiceFailure }
}

impl From<NodeListError> for LookupError {
    fn from(error: NodeListError) -> Self {
        match error {
            NodeListError::NotImplemented(fault) => LookupError::NotImplemented(fault),
            NodeListError::ServiceFailure(fault) => LookupError::ServiceFailure(fault),
            NodeListError::Client(error) => LookupError::Client(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_kind_maps_to_variant() {
        let fault = ServiceFault::new(ErrorKind::NotFound, "1020", "gone");
        let error: GetError = DispatchError::Service(fault.clone()).into();
        assert_eq!(error, GetError::NotFound(fault));
        assert_eq!(error.kind(), Some(ErrorKind::NotFound));
    }

    #[test]
    fn test_undeclared_kind_coerced_to_service_failure() {
        let fault = ServiceFault::new(ErrorKind::IdentifierNotUnique, "1190", "taken");
        let error: DeleteError = fault.into();
        match error {
            DeleteError::ServiceFailure(fault) => {
                assert_eq!(fault.detail_code(), "1190");
                assert!(fault.description().contains("IdentifierNotUnique"));
            }
            other => panic!("expected ServiceFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_client_errors_pass_through() {
        let error: CreateError = DispatchError::Client(ClientError::Transport("reset".into())).into();
        assert!(error.is_client_side());
        assert!(error.fault().is_none());
    }

    #[test]
    fn test_declared_lists() {
        assert!(UpdateError::DECLARED.contains(&ErrorKind::NotFound));
        assert!(!CreateError::DECLARED.contains(&ErrorKind::NotFound));
        assert!(LookupError::DECLARED.contains(&ErrorKind::ServiceFailure));
    }
}
