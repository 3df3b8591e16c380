//! XML error envelope codec
//!
//! A service reports a failure as
//!
//! ```xml
//! <error name="NotFound" errorCode="404" detailCode="1020" identifier="pid" nodeId="urn:node:X">
//!   <description>No system metadata could be found for given PID: pid</description>
//!   <traceInformation>...</traceInformation>
//! </error>
//! ```
//!
//! HEAD responses carry no body, so the same fields travel in `DataONE-Exception-*` headers.

use super::{ErrorKind, FaultOrigin, ServiceFault};
use crate::marshal::{self, MarshalError};
use serde::{Deserialize, Serialize};

pub const EXCEPTION_NAME_HEADER: &str = "DataONE-Exception-Name";
pub const EXCEPTION_DETAIL_CODE_HEADER: &str = "DataONE-Exception-DetailCode";
pub const EXCEPTION_DESCRIPTION_HEADER: &str = "DataONE-Exception-Description";
pub const EXCEPTION_PID_HEADER: &str = "DataONE-Exception-PID";

const ENVELOPE_ROOT: &str = "error";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename = "error")]
struct ErrorEnvelope {
    #[serde(rename = "@name", default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "@errorCode", default, skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(rename = "@detailCode", default, skip_serializing_if = "Option::is_none")]
    detail_code: Option<String>,
    #[serde(rename = "@identifier", default, skip_serializing_if = "Option::is_none")]
    identifier: Option<String>,
    #[serde(rename = "@nodeId", default, skip_serializing_if = "Option::is_none")]
    node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(rename = "traceInformation", default, skip_serializing_if = "Option::is_none")]
    trace_information: Option<String>,
}

pub(super) fn to_xml(fault: &ServiceFault) -> String {
    let envelope = ErrorEnvelope {
        name: Some(fault.kind.name().to_string()),
        error_code: Some(fault.error_code.to_string()),
        detail_code: Some(fault.detail_code.clone()),
        identifier: fault.identifier.clone(),
        node_id: fault.node_id.clone(),
        description: Some(fault.description.clone()),
        trace_information: fault.trace_information.clone(),
    };
    // ErrorEnvelope holds only strings, serialization cannot fail
    marshal::to_xml(&envelope).unwrap_or_default()
}

pub(super) fn from_xml(xml: &[u8]) -> Result<ServiceFault, MarshalError> {
    let envelope: ErrorEnvelope = marshal::from_xml_rooted(xml, ENVELOPE_ROOT)?;

    let error_code = envelope
        .error_code
        .as_deref()
        .and_then(|code| code.trim().parse::<u16>().ok());
    let kind = envelope
        .name
        .as_deref()
        .and_then(ErrorKind::from_name)
        .or_else(|| error_code.map(ErrorKind::from_code))
        .ok_or_else(|| MarshalError::Deserialize("error envelope has neither a name nor an errorCode".to_string()))?;

    Ok(ServiceFault {
        kind,
        error_code: error_code.unwrap_or_else(|| kind.default_code()),
        detail_code: envelope.detail_code.unwrap_or_else(|| "0".to_string()),
        description: marshal::child_text(xml, "description")
            .or(envelope.description)
            .unwrap_or_default(),
        identifier: envelope.identifier,
        node_id: envelope.node_id,
        trace_information: envelope.trace_information,
        origin: FaultOrigin::Remote,
    })
}

/// Build a fault from the `DataONE-Exception-*` headers of a body-less response.
pub fn fault_from_headers<'a, F>(status: u16, header: F) -> Option<ServiceFault>
where
    F: Fn(&str) -> Option<&'a str>,
{
    let name = header(EXCEPTION_NAME_HEADER)?;
    let kind = ErrorKind::from_name(name).unwrap_or_else(|| ErrorKind::from_code(status));
    let mut fault = ServiceFault::new(
        kind,
        header(EXCEPTION_DETAIL_CODE_HEADER).unwrap_or("0"),
        header(EXCEPTION_DESCRIPTION_HEADER).unwrap_or_default(),
    )
    .with_error_code(status);
    if let Some(pid) = header(EXCEPTION_PID_HEADER) {
        fault = fault.with_identifier(pid);
    }
    Some(fault)
}
