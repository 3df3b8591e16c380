//! Shared fixtures: a recording transport spy and canned DataONE documents
#![allow(dead_code)]

use d1_client::error::{ErrorKind, ServiceFault};
use d1_client::rest::{
    D1RestClient, HttpExecutor, HttpRequest, Method, MultipartRestClient, RawResponse, RequestConfig, RestClient,
    TransportError,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

/// One exchange seen by a [`SpyExecutor`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub parts: Vec<(String, Vec<u8>)>,
    pub spooled: Vec<PathBuf>,
    pub config: RequestConfig,
}

impl RecordedRequest {
    pub fn part(&self, name: &str) -> Option<String> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| String::from_utf8_lossy(v).into_owned())
    }
}

type Handler = Box<dyn Fn(&HttpRequest<'_>) -> Result<RawResponse, TransportError> + Send + Sync>;

/// Transport spy: records every exchange and answers from a handler
pub struct SpyExecutor {
    label: String,
    handler: Handler,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl SpyExecutor {
    pub fn with_handler<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest<'_>) -> Result<RawResponse, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            label: "spy".to_string(),
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Same response for every request
    pub fn responding(status: u16, body: &str) -> Arc<Self> {
        let body = body.to_string();
        Self::with_handler(move |_| Ok(RawResponse::new(status, body.clone())))
    }

    /// Answer by URL suffix; anything unmatched gets a 404 with no body
    pub fn routes(routes: Vec<(&str, RawResponse)>) -> Arc<Self> {
        let routes: Vec<(String, RawResponse)> = routes.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        Self::with_handler(move |request| {
            let path = request.url.split('?').next().unwrap_or_default();
            Ok(routes
                .iter()
                .find(|(suffix, _)| path.ends_with(suffix.as_str()))
                .map(|(_, response)| response.clone())
                .unwrap_or_else(|| RawResponse::new(404, "")))
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        let message = message.to_string();
        Self::with_handler(move |_| Err(TransportError::Io(message.clone())))
    }

    pub fn labelled(label: &str, status: u16, body: &str) -> Arc<Self> {
        let body = body.to_string();
        Arc::new(Self {
            label: label.to_string(),
            handler: Box::new(move |_| Ok(RawResponse::new(status, body.clone()))),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last(&self) -> RecordedRequest {
        self.requests.lock().last().cloned().expect("no request recorded")
    }
}

impl HttpExecutor for SpyExecutor {
    fn execute(&self, request: &HttpRequest<'_>) -> Result<RawResponse, TransportError> {
        let (parts, spooled) = match request.body {
            Some(body) => (
                body.parts()
                    .iter()
                    .map(|p| (p.name().to_string(), p.to_bytes().expect("readable part").to_vec()))
                    .collect(),
                body.spooled_paths(),
            ),
            None => (Vec::new(), Vec::new()),
        };
        self.requests.lock().push(RecordedRequest {
            method: request.method,
            url: request.url.to_string(),
            headers: request.headers.to_vec(),
            parts,
            spooled,
            config: *request.config,
        });
        (self.handler)(request)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Gateway over a spy, with no base configuration
pub fn gateway(spy: &Arc<SpyExecutor>) -> Arc<dyn D1RestClient> {
    let executor: Arc<dyn HttpExecutor> = spy.clone();
    Arc::new(MultipartRestClient::new(Arc::new(RestClient::new(executor))))
}

/// `nodeList` document; entries are (reference, "mn"/"cn", base URL, description)
pub fn node_list_xml(entries: &[(&str, &str, &str, Option<&str>)]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><d1:nodeList xmlns:d1="http://ns.dataone.org/service/types/v2.0">"#);
    for (reference, node_type, base_url, description) in entries {
        xml.push_str(&format!(r#"<node type="{}" state="up"><identifier>{}</identifier><name>{}</name>"#, node_type, reference, reference));
        if let Some(description) = description {
            xml.push_str(&format!("<description>{}</description>", description));
        }
        xml.push_str(&format!("<baseURL>{}</baseURL></node>", base_url));
    }
    xml.push_str("</d1:nodeList>");
    xml
}

/// Error envelope for `kind` as a service would send it
pub fn envelope(kind: ErrorKind, detail_code: &str, description: &str) -> String {
    ServiceFault::new(kind, detail_code, description).to_xml()
}

/// Response carrying an error envelope, with the kind's HTTP status
pub fn error_response(kind: ErrorKind, detail_code: &str, description: &str) -> RawResponse {
    let status = match kind.default_code() {
        code if code >= 400 => code,
        _ => 500,
    };
    RawResponse::new(status, envelope(kind, detail_code, description))
}

pub fn identifier_xml(pid: &str) -> String {
    format!(r#"<d1:identifier xmlns:d1="http://ns.dataone.org/service/types/v1">{}</d1:identifier>"#, pid)
}

pub fn sysmeta_xml(pid: &str) -> String {
    format!(
        r#"<d1:systemMetadata xmlns:d1="http://ns.dataone.org/service/types/v2.0"><serialVersion>1</serialVersion><identifier>{}</identifier><formatId>text/csv</formatId><size>3</size><checksum algorithm="MD5">abc</checksum></d1:systemMetadata>"#,
        pid
    )
}
