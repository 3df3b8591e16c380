//! # DataONE Client Library
//!
//! A blocking client for the DataONE federation: Member Nodes (MN) store science data,
//! Coordinating Nodes (CN) provide registry, resolution and identity services.
//!
//! ## Core Components
//!
//! * `client` - Process-wide facade handing out CN and MN handles
//! * `locator` - Node registry and Coordinating Node selection
//! * `node` - MN and CN handles mapping typed calls to REST resources
//! * `rest` - Typed REST gateway, credential-bound gateway and the transport under them
//! * `error` - Client-side errors, service faults and per-operation error sets
//! * `types` - Node references, node lists, sessions and typed results
//! * `marshal` - XML (de)serialization boundary
//! * `config` - Settings loaded from TOML
//! * `logging` - `env_logger` setup for applications
//!
//! ## Architecture
//!
//! A call flows facade → locator → node handle → gateway → transport → remote node.
//! Responses are deserialized in the node layer; HTTP and I/O failures are translated
//! in the gateway, so every operation sees either a typed result, one of the service
//! faults it declares, or a client-side error.

pub mod client;
pub mod config;
pub mod error;
pub mod locator;
pub mod logging;
pub mod marshal;
pub mod node;
pub mod rest;
pub mod types;

pub use client::{D1Client, D1ClientBuilder};
pub use config::{load_settings, ClientSettings};
pub use error::{ClientError, ClientResult, DispatchError, ErrorKind, FaultOrigin, ServiceFault};
pub use locator::{CNodeFactories, NodeHandle, NodeListLocator, NodeLocator, SettingsNodeLocator};
pub use node::{CNode, D1Node, ListQuery, MNode, NodeOptions};
pub use rest::{
    CredentialManager, D1RestClient, DefaultMultipartRestClient, ExecutorFactory, HttpExecutor, MultipartBody,
    MultipartRestClient, RestClient,
};
pub use types::{Identifier, NodeList, NodeRecord, NodeReference, NodeType, Session};
