//! Domain types shared across the client

pub mod node;
pub mod object;
pub mod session;

pub use node::{NodeList, NodeRecord, NodeReference, NodeType};
pub use object::{
    Checksum, DescribeResponse, Group, Identifier, Log, LogEntry, ObjectInfo, ObjectList, ObjectLocation,
    ObjectLocationList, Permission, Person, ReplicationStatus, SubjectInfo, SystemMetadata,
};
pub use session::{Certificate, Session};
