//! XML marshalling boundary
//!
//! Typed results travel as the services' native XML. This module is the only place that
//! touches the XML library; node operations convert its errors into service failures.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while converting between XML and typed values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarshalError {
    #[error("XML deserialization failed: {0}")]
    Deserialize(String),

    #[error("XML serialization failed: {0}")]
    Serialize(String),

    #[error("Unexpected root element: expected <{expected}>, found <{found}>")]
    UnexpectedRoot { expected: String, found: String },

    #[error("Document is empty or has no root element")]
    Empty,
}

/// Decode an XML document into `T`.
pub fn from_xml<T: DeserializeOwned>(xml: &[u8]) -> Result<T, MarshalError> {
    let text = std::str::from_utf8(xml).map_err(|e| MarshalError::Deserialize(e.to_string()))?;
    if text.trim().is_empty() {
        return Err(MarshalError::Empty);
    }
    quick_xml::de::from_str(text).map_err(|e| MarshalError::Deserialize(e.to_string()))
}

/// Decode an XML document into `T`, first checking the local name of its root element.
///
/// The deserializer does not look at the root element name, so without this check any
/// well-formed document (an HTML error page, say) would decode into a struct whose
/// fields are all optional.
pub fn from_xml_rooted<T: DeserializeOwned>(xml: &[u8], expected_root: &str) -> Result<T, MarshalError> {
    let found = root_element_name(xml).ok_or(MarshalError::Empty)?;
    if found != expected_root {
        return Err(MarshalError::UnexpectedRoot {
            expected: expected_root.to_string(),
            found,
        });
    }
    from_xml(xml)
}

/// Encode `value` as an XML document rooted at its serde name.
pub fn to_xml<T: Serialize>(value: &T) -> Result<String, MarshalError> {
    quick_xml::se::to_string(value).map_err(|e| MarshalError::Serialize(e.to_string()))
}

/// Text of the first `name` element directly under the root, whitespace untouched.
///
/// The serde deserializer trims text content; callers that must keep it verbatim read it here.
pub fn child_text(xml: &[u8], name: &str) -> Option<String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut text: Option<String> = None;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element)) => {
                depth += 1;
                if depth == 2 && text.is_none() && element.local_name().as_ref() == name.as_bytes() {
                    text = Some(String::new());
                }
            }
            Ok(Event::Empty(element)) => {
                if depth == 1 && text.is_none() && element.local_name().as_ref() == name.as_bytes() {
                    return Some(String::new());
                }
            }
            Ok(Event::Text(content)) if depth == 2 => {
                if let Some(text) = text.as_mut() {
                    text.push_str(&content.unescape().ok()?);
                }
            }
            Ok(Event::CData(content)) if depth == 2 => {
                if let Some(text) = text.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&content.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                if depth == 2 && text.is_some() {
                    return text;
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

/// Local name (namespace prefix stripped) of the first element in `xml`.
pub fn root_element_name(xml: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                return Some(String::from_utf8_lossy(element.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}
