//! Gateway tests: request configuration, error translation, diagnostics and
//! credential rotation over a recording transport

mod common;

use common::{envelope, error_response, gateway, SpyExecutor};
use d1_client::error::{ClientError, DispatchError, ErrorKind, EXCEPTION_DESCRIPTION_HEADER, EXCEPTION_NAME_HEADER};
use d1_client::rest::{
    CredentialManager, D1RestClient, DefaultMultipartRestClient, ExecutorFactory, HttpExecutor, Method,
    MultipartBody, MultipartRestClient, RawResponse, RequestConfig, RestClient, StaticCredentialManager,
};
use d1_client::types::Session;
use d1_client::ClientSettings;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;

fn spooled_body() -> MultipartBody {
    let mut body = MultipartBody::new();
    body.add_text("pid", "abc");
    body.add_reader("object", Cursor::new(b"0123456789".to_vec())).unwrap();
    body
}

#[test]
fn test_timeout_overlay_reaches_transport() {
    let spy = SpyExecutor::responding(200, "");
    let executor: Arc<dyn HttpExecutor> = spy.clone();
    let client = MultipartRestClient::new(Arc::new(RestClient::new(executor))).with_default_timeout(5000);

    client.do_get("https://mn.example.org/mn/v2/object", None, None).unwrap();
    assert_eq!(spy.last().config, RequestConfig::with_timeout(5000));

    client.do_get("https://mn.example.org/mn/v2/object", Some(10), Some(false)).unwrap();
    let config = spy.last().config;
    assert_eq!(config.connect_timeout_ms, Some(10));
    assert_eq!(config.request_timeout_ms, Some(10));
    assert_eq!(config.socket_timeout_ms, Some(10));
    assert!(!config.follow_redirects);
}

#[test]
fn test_no_base_config_leaves_timeouts_unset() {
    let spy = SpyExecutor::responding(200, "");
    let client = gateway(&spy);

    client.do_head("https://mn.example.org/mn/v2/object/x", None).unwrap();

    let recorded = spy.last();
    assert_eq!(recorded.method, Method::Head);
    assert_eq!(recorded.config, RequestConfig::unset());
}

#[test]
fn test_every_error_kind_is_translated() {
    for (index, kind) in ErrorKind::ALL.into_iter().enumerate() {
        let description = if index % 2 == 0 {
            format!("{} raised for <pid> & friends", kind)
        } else {
            format!("  {} raised\n    at line one\n    at line two  \n", kind)
        };
        let spy = SpyExecutor::with_handler({
            let description = description.clone();
            move |_| Ok(error_response(kind, "1234", &description))
        });

        let error = gateway(&spy)
            .do_get("https://mn.example.org/mn/v2/object/x", None, None)
            .unwrap_err();

        let fault = error.fault().unwrap_or_else(|| panic!("{} became a client error", kind));
        assert_eq!(fault.kind(), kind);
        assert_eq!(fault.detail_code(), "1234");
        assert_eq!(fault.description(), description);
        assert!(!fault.is_local());
    }
}

#[test]
fn test_pretty_printed_envelope_keeps_description_text() {
    let body = "<error name=\"NotFound\" errorCode=\"404\" detailCode=\"1020\">\n  <description>  line one\n  line two  </description>\n</error>";
    let spy = SpyExecutor::responding(404, body);

    let error = gateway(&spy).do_get("https://mn.example.org/mn/v2/object/x", None, None).unwrap_err();

    assert_eq!(error.fault().unwrap().description(), "  line one\n  line two  ");
}

#[test]
fn test_envelope_with_only_error_code() {
    let body = r#"<error errorCode="401" detailCode="1030"><description>token expired</description></error>"#;
    let spy = SpyExecutor::responding(401, body);

    let error = gateway(&spy).do_delete("https://mn.example.org/mn/v2/object/x", None).unwrap_err();

    let fault = error.fault().unwrap();
    assert_eq!(fault.kind(), ErrorKind::InvalidToken);
    assert_eq!(fault.error_code(), 401);
}

#[test]
fn test_unparseable_error_body_is_service_failure() {
    let spy = SpyExecutor::responding(502, "<html><body>Bad Gateway</body></html>");

    let error = gateway(&spy).do_get("https://mn.example.org/mn/v2/node", None, None).unwrap_err();

    let fault = error.fault().unwrap();
    assert_eq!(fault.kind(), ErrorKind::ServiceFailure);
    assert_eq!(fault.detail_code(), "0");
    assert_eq!(fault.error_code(), 502);
    assert!(fault.description().contains("502"));
    assert!(fault.description().contains("Bad Gateway"));
}

#[test]
fn test_head_error_read_from_headers() {
    let spy = SpyExecutor::with_handler(|_| {
        Ok(RawResponse::new(404, "")
            .with_header(EXCEPTION_NAME_HEADER, "NotFound")
            .with_header(EXCEPTION_DESCRIPTION_HEADER, "no such object"))
    });

    let error = gateway(&spy).do_head("https://mn.example.org/mn/v2/object/x", None).unwrap_err();

    let fault = error.fault().unwrap();
    assert_eq!(fault.kind(), ErrorKind::NotFound);
    assert_eq!(fault.description(), "no such object");
}

#[test]
fn test_see_other_is_not_an_error() {
    let spy = SpyExecutor::responding(303, "<objectLocationList/>");

    let response = gateway(&spy)
        .do_get("https://cn.example.org/cn/v2/resolve/x", None, Some(false))
        .unwrap();

    assert_eq!(response.status, 303);
}

#[test]
fn test_transport_failure_is_client_error() {
    let spy = SpyExecutor::failing("connection refused");

    let error = gateway(&spy).do_get("https://mn.example.org/mn/v2/object/x", None, None).unwrap_err();

    match error {
        DispatchError::Client(ClientError::Transport(message)) => {
            assert!(message.contains("GET https://mn.example.org/mn/v2/object/x"));
            assert!(message.contains("connection refused"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_body_on_get_never_reaches_transport() {
    let spy = SpyExecutor::responding(200, "");
    let client = gateway(&spy);
    let body = spooled_body();
    let paths = body.spooled_paths();

    let error = client
        .send(Method::Get, "https://mn.example.org/mn/v2/object", Some(body), None, None)
        .unwrap_err();

    assert!(error.is_client_side());
    assert_eq!(spy.count(), 0);
    assert!(paths.iter().all(|path| !path.exists()));
}

#[test]
fn test_spooled_parts_released_after_every_outcome() {
    let responses = [
        RawResponse::new(200, ""),
        error_response(ErrorKind::InvalidRequest, "1102", "bad sysmeta"),
    ];
    for response in responses {
        let spy = SpyExecutor::with_handler(move |_| Ok(response.clone()));
        let _ = gateway(&spy).do_post("https://mn.example.org/mn/v2/object", Some(spooled_body()), None);

        let recorded = spy.last();
        assert_eq!(recorded.part("object").as_deref(), Some("0123456789"));
        assert_eq!(recorded.spooled.len(), 1);
        assert!(!recorded.spooled[0].exists());
    }

    let spy = SpyExecutor::failing("reset by peer");
    let _ = gateway(&spy).do_put("https://mn.example.org/mn/v2/object/x", Some(spooled_body()), None);
    assert!(!spy.last().spooled[0].exists());
}

#[test]
fn test_latest_request_describes_call() {
    let spy = SpyExecutor::responding(500, &envelope(ErrorKind::ServiceFailure, "0", "boom"));
    let client = gateway(&spy);

    let _ = client.do_post("https://mn.example.org/mn/v2/object", Some(spooled_body()), None);

    let latest = client.latest_request().unwrap();
    assert!(latest.starts_with("POST https://mn.example.org/mn/v2/object; "));
    assert!(latest.contains("pid=3B"));
    assert!(latest.contains("object=[file 10B]"));
}

#[test]
fn test_latest_request_is_per_thread() {
    let spy = SpyExecutor::responding(200, "");
    let client = gateway(&spy);
    client.do_get("https://mn.example.org/mn/v2/main", None, None).unwrap();

    let other = Arc::clone(&client);
    let seen_by_worker = thread::spawn(move || {
        let before = other.latest_request();
        other.do_get("https://mn.example.org/mn/v2/worker", None, None).unwrap();
        (before, other.latest_request())
    })
    .join()
    .unwrap();

    assert_eq!(seen_by_worker.0, None);
    assert_eq!(seen_by_worker.1.as_deref(), Some("GET https://mn.example.org/mn/v2/worker"));
    assert_eq!(client.latest_request().as_deref(), Some("GET https://mn.example.org/mn/v2/main"));
}

#[test]
fn test_static_headers_sent() {
    let spy = SpyExecutor::responding(200, "");
    let executor: Arc<dyn HttpExecutor> = spy.clone();
    let rest_client = RestClient::new(executor).with_headers(vec![("User-Agent".to_string(), "tests/1.0".to_string())]);
    let client = MultipartRestClient::new(Arc::new(rest_client));

    client.do_get("https://mn.example.org/mn/v2/node", None, None).unwrap();

    assert_eq!(spy.last().headers, vec![("User-Agent".to_string(), "tests/1.0".to_string())]);
}

// Factory handing out one spy per subject; subjects starting with "bad" are refused
struct SpyFactory {
    spies: Mutex<HashMap<String, Arc<SpyExecutor>>>,
}

impl SpyFactory {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            spies: Mutex::new(HashMap::new()),
        })
    }

    fn spy(&self, subject: &str) -> Option<Arc<SpyExecutor>> {
        self.spies.lock().get(subject).cloned()
    }
}

impl ExecutorFactory for SpyFactory {
    fn build(&self, session: &Session) -> Result<Arc<dyn HttpExecutor>, ClientError> {
        let subject = session.subject().unwrap_or("public").to_string();
        if subject.starts_with("bad") {
            return Err(ClientError::Credential(format!("cannot load {}", subject)));
        }
        let spy = SpyExecutor::labelled(&subject, 200, "");
        self.spies.lock().insert(subject, Arc::clone(&spy));
        Ok(spy)
    }
}

#[test]
fn test_credential_change_swaps_engine() {
    let manager = Arc::new(StaticCredentialManager::new(Session::new().with_subject("alice")));
    let factory = SpyFactory::new();
    let client = DefaultMultipartRestClient::from_settings(
        &ClientSettings::default(),
        manager.clone(),
        factory.clone(),
    )
    .unwrap();

    client.do_get("https://mn.example.org/mn/v2/a", None, None).unwrap();
    assert_eq!(client.current_executor().describe(), "alice");

    manager.set_session(Session::new().with_subject("bob"));
    client.do_get("https://mn.example.org/mn/v2/b", None, None).unwrap();

    assert_eq!(client.current_executor().describe(), "bob");
    assert_eq!(factory.spy("alice").unwrap().count(), 1);
    assert_eq!(factory.spy("bob").unwrap().count(), 1);
}

#[test]
fn test_failed_credential_change_keeps_previous_engine() {
    let manager = Arc::new(StaticCredentialManager::new(Session::new().with_subject("alice")));
    let factory = SpyFactory::new();
    let client = DefaultMultipartRestClient::new(manager.clone(), factory.clone()).unwrap();

    manager.set_session(Session::new().with_subject("bad-cert"));
    client.do_get("https://mn.example.org/mn/v2/a", None, None).unwrap();
    client.do_get("https://mn.example.org/mn/v2/b", None, None).unwrap();

    assert_eq!(client.current_executor().describe(), "alice");
    assert_eq!(factory.spy("alice").unwrap().count(), 2);

    manager.set_session(Session::new().with_subject("carol"));
    client.do_get("https://mn.example.org/mn/v2/c", None, None).unwrap();
    assert_eq!(factory.spy("carol").unwrap().count(), 1);
}

#[test]
fn test_settings_shape_credential_bound_gateway() {
    let manager: Arc<dyn CredentialManager> = Arc::new(StaticCredentialManager::anonymous());
    let factory = SpyFactory::new();
    let settings = ClientSettings::default()
        .with_default_timeout(2500)
        .with_header("X-Trace", "on");
    let client = DefaultMultipartRestClient::from_settings(&settings, manager, factory.clone()).unwrap();

    client.do_get("https://mn.example.org/mn/v2/node", None, None).unwrap();

    let recorded = factory.spy("public").unwrap().last();
    assert_eq!(recorded.config.request_timeout_ms, Some(2500));
    assert!(recorded
        .headers
        .iter()
        .any(|(name, value)| name == "X-Trace" && value == "on"));
}
