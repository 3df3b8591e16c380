//! Node locator tests: CN rotation, registry lookups and settings-driven construction

mod common;

use common::{gateway, node_list_xml, SpyExecutor};
use d1_client::error::{ClientError, ErrorKind, NodeListError};
use d1_client::locator::{CNodeFactories, NodeHandle, NodeListLocator, NodeLocator, SettingsNodeLocator};
use d1_client::node::{CNode, D1Node, MNode, NodeOptions};
use d1_client::rest::{D1RestClient, RawResponse};
use d1_client::types::{NodeList, NodeReference, NodeType};
use d1_client::ClientSettings;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

fn parse(entries: &[(&str, &str, &str, Option<&str>)]) -> NodeList {
    NodeList::from_xml(node_list_xml(entries).as_bytes()).expect("node list parses")
}

fn offline() -> Arc<dyn D1RestClient> {
    gateway(&SpyExecutor::responding(500, ""))
}

fn locator(entries: &[(&str, &str, &str, Option<&str>)]) -> NodeListLocator {
    NodeListLocator::new(&parse(entries), offline())
}

#[test]
fn test_single_cn_is_always_selected() {
    let locator = locator(&[
        ("urn:node:mnA", "mn", "https://a.example.org/mn", None),
        ("urn:node:CN", "cn", "https://cn.example.org/cn", None),
    ]);

    let first = locator.get_cnode().unwrap();
    for _ in 0..10 {
        assert!(Arc::ptr_eq(&first, &locator.get_cnode().unwrap()));
    }
    assert_eq!(first.base_url(), "https://cn.example.org/cn");
}

#[test]
fn test_cns_rotate_in_document_order() {
    let locator = locator(&[
        ("urn:node:CN1", "cn", "https://cn1.example.org/cn", None),
        ("urn:node:mnA", "mn", "https://a.example.org/mn", None),
        ("urn:node:CN2", "cn", "https://cn2.example.org/cn", None),
        ("urn:node:CN3", "cn", "https://cn3.example.org/cn", None),
    ]);

    let seen: Vec<String> = (0..6)
        .map(|_| locator.get_cnode().unwrap().base_url().to_string())
        .collect();
    assert_eq!(
        seen,
        vec![
            "https://cn1.example.org/cn",
            "https://cn2.example.org/cn",
            "https://cn3.example.org/cn",
            "https://cn1.example.org/cn",
            "https://cn2.example.org/cn",
            "https://cn3.example.org/cn",
        ]
    );
}

#[test]
fn test_round_robin_cn_is_sole_entry() {
    let orders: [[(&str, &str, &str, Option<&str>); 3]; 3] = [
        [
            ("urn:node:CN1", "cn", "https://cn1.example.org/cn", None),
            ("urn:node:CN2", "cn", "https://cn2.example.org/cn", None),
            ("urn:node:CNRR", "cn", "https://cn.example.org/cn", Some("Round Robin CN")),
        ],
        [
            ("urn:node:CNRR", "cn", "https://cn.example.org/cn", Some("Round Robin CN")),
            ("urn:node:CN1", "cn", "https://cn1.example.org/cn", None),
            ("urn:node:CN2", "cn", "https://cn2.example.org/cn", None),
        ],
        [
            ("urn:node:CN1", "cn", "https://cn1.example.org/cn", None),
            ("urn:node:CNRR", "cn", "https://cn.example.org/cn", Some("Round Robin CN")),
            ("urn:node:CN2", "cn", "https://cn2.example.org/cn", Some("Primary CN")),
        ],
    ];

    for entries in orders.iter() {
        let locator = locator(entries);
        assert_eq!(locator.rotation().len(), 1);
        for _ in 0..5 {
            assert_eq!(locator.get_cnode().unwrap().base_url(), "https://cn.example.org/cn");
        }
        // The other CNs stay reachable by reference
        assert!(locator.get_node(&NodeReference::new("urn:node:CN1")).is_ok());
    }
}

#[test]
fn test_several_round_robin_cns_pick_smallest_reference() {
    let locator = locator(&[
        ("urn:node:Z", "cn", "https://z.example.org/cn", Some("Round Robin")),
        ("urn:node:M", "cn", "https://m.example.org/cn", Some("round robin too")),
        ("urn:node:A", "cn", "https://a.example.org/cn", None),
    ]);

    assert_eq!(locator.rotation().len(), 1);
    assert_eq!(locator.get_cnode().unwrap().base_url(), "https://m.example.org/cn");
}

#[test]
fn test_round_robin_reference_reused_by_member_node() {
    let locator = locator(&[
        ("urn:node:X", "cn", "https://x.example.org/cn", Some("Round Robin")),
        ("urn:node:CN1", "cn", "https://cn1.example.org/cn", None),
        ("urn:node:CN2", "cn", "https://cn2.example.org/cn", None),
        ("urn:node:X", "mn", "https://x.example.org/mn", None),
    ]);

    assert_eq!(locator.rotation().len(), 2);
    assert_eq!(locator.get_cnode().unwrap().base_url(), "https://cn1.example.org/cn");
    assert_eq!(locator.get_cnode().unwrap().base_url(), "https://cn2.example.org/cn");
    assert!(matches!(
        locator.get_node(&NodeReference::new("urn:node:X")).unwrap(),
        NodeHandle::Member(_)
    ));
}

#[test]
fn test_no_cn_is_an_error() {
    let locator = locator(&[
        ("urn:node:mnA", "mn", "https://a.example.org/mn", None),
        ("urn:node:mnB", "mn", "https://b.example.org/mn", None),
    ]);

    assert_eq!(locator.get_cnode().unwrap_err(), ClientError::NoCoordinatingNode);
    assert_eq!(locator.node_references().len(), 2);
}

#[test]
fn test_put_node_replaces_previous_handle() {
    let locator = locator(&[("urn:node:CN", "cn", "https://cn.example.org/cn", None)]);
    let reference = NodeReference::new("urn:node:X");

    let first = NodeHandle::Member(Arc::new(MNode::new("https://x.example.org/a", offline())));
    let second = NodeHandle::Member(Arc::new(MNode::new("https://x.example.org/b", offline())));
    locator.put_node(reference.clone(), first.clone());
    locator.put_node(reference.clone(), second.clone());

    let found = locator.get_node(&reference).unwrap();
    assert!(found.ptr_eq(&second));
    assert!(!found.ptr_eq(&first));
    assert_eq!(found.base_url(), "https://x.example.org/b");
}

#[test]
fn test_lookup_does_not_construct_handles() {
    let locator = locator(&[
        ("urn:node:CN", "cn", "https://cn.example.org/cn", None),
        ("urn:node:mnA", "mn", "https://a.example.org/mn", None),
    ]);

    let missing = locator.get_node(&NodeReference::new("urn:node:unknown"));
    assert!(matches!(missing, Err(ClientError::NodeNotFound(_))));
    assert!(locator.get_node_by_url("https://nowhere.example.org/mn").is_err());
    assert_eq!(locator.node_references().len(), 2);
}

#[test]
fn test_three_node_environment() {
    let locator = locator(&[
        ("urn:node:CN", "cn", "https://cn.example.org/cn", Some("Robin CN")),
        ("urn:node:mnA", "mn", "https://a.example.org/mn", None),
        ("urn:node:mnB", "mn", "https://b.example.org/mn/", None),
        ("urn:node:monitor", "monitor", "https://monitor.example.org", None),
    ]);

    let references: Vec<String> = locator.node_references().iter().map(|r| r.to_string()).collect();
    assert_eq!(references, vec!["urn:node:CN", "urn:node:mnA", "urn:node:mnB"]);

    let mn_a = locator.get_node(&NodeReference::new("urn:node:mnA")).unwrap();
    assert_eq!(mn_a.node_type(), NodeType::Member);
    assert_eq!(mn_a.node().node_id(), Some(&NodeReference::new("urn:node:mnA")));

    let mn_b = locator.get_node_by_url("https://b.example.org/mn").unwrap();
    assert_eq!(mn_b.base_url(), "https://b.example.org/mn");
    assert!(mn_b.as_member().is_some());

    let cn = locator.get_node(&NodeReference::new("urn:node:CN")).unwrap();
    assert!(Arc::ptr_eq(cn.as_coordinating().unwrap(), &locator.get_cnode().unwrap()));
}

#[test]
fn test_concurrent_selection_is_fair() {
    let locator = Arc::new(locator(&[
        ("urn:node:CN1", "cn", "https://cn1.example.org/cn", None),
        ("urn:node:CN2", "cn", "https://cn2.example.org/cn", None),
        ("urn:node:CN3", "cn", "https://cn3.example.org/cn", None),
    ]));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let locator = Arc::clone(&locator);
            thread::spawn(move || {
                (0..300)
                    .map(|_| locator.get_cnode().unwrap().base_url().to_string())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for handle in handles {
        for url in handle.join().unwrap() {
            *counts.entry(url).or_default() += 1;
        }
    }
    assert_eq!(counts.len(), 3);
    assert!(counts.values().all(|count| *count == 400));
}

#[test]
fn test_settings_locator_from_node_list() {
    let rest_client = offline();
    let cn = Arc::new(CNode::new("https://pinned.example.org/cn", Arc::clone(&rest_client)));
    let list = parse(&[
        ("urn:node:CN1", "cn", "https://cn1.example.org/cn", None),
        ("urn:node:CN2", "cn", "https://cn2.example.org/cn", None),
        ("urn:node:mnA", "mn", "https://a.example.org/mn", None),
    ]);

    let locator = SettingsNodeLocator::from_node_list(Arc::clone(&cn), &list, rest_client, &NodeOptions::default());

    for _ in 0..3 {
        assert!(Arc::ptr_eq(&locator.get_cnode().unwrap(), &cn));
    }
    assert!(locator.get_node(&NodeReference::new("urn:node:mnA")).is_ok());
}

#[test]
fn test_settings_locator_fetches_node_list_from_configured_cn() {
    let spy = SpyExecutor::routes(vec![(
        "/cn/v2/node",
        RawResponse::new(
            200,
            node_list_xml(&[
                ("urn:node:CN", "cn", "https://cn.example.org/cn", None),
                ("urn:node:mnA", "mn", "https://a.example.org/mn", None),
            ]),
        ),
    )]);
    let settings = ClientSettings::default().with_cn_base_url("https://cn-stage.example.org/cn");

    let locator = SettingsNodeLocator::new(&settings, gateway(&spy), &CNodeFactories::new()).unwrap();

    assert_eq!(spy.count(), 1);
    assert_eq!(spy.last().url, "https://cn-stage.example.org/cn/v2/node");
    assert_eq!(locator.get_cnode().unwrap().base_url(), "https://cn-stage.example.org/cn");
    assert_eq!(locator.node_references().len(), 2);
}

#[test]
fn test_settings_locator_uses_registered_factory() {
    let spy = SpyExecutor::routes(vec![(
        "/v2/node",
        RawResponse::new(200, node_list_xml(&[("urn:node:mnA", "mn", "https://a.example.org/mn", None)])),
    )]);
    let factories = CNodeFactories::new().with_factory("mirror", |base_url, rest_client, options| {
        Ok(CNode::with_options(&format!("{}/mirror", base_url), rest_client, options))
    });
    let settings = ClientSettings::default()
        .with_cn_base_url("https://cn.example.org/cn")
        .with_cn_factory("mirror");

    let locator = SettingsNodeLocator::new(&settings, gateway(&spy), &factories).unwrap();

    assert_eq!(locator.cn().base_url(), "https://cn.example.org/cn/mirror");
    assert_eq!(spy.last().url, "https://cn.example.org/cn/mirror/v2/node");
}

#[test]
fn test_settings_locator_rejects_unknown_factory() {
    let spy = SpyExecutor::responding(200, "");
    let settings = ClientSettings::default()
        .with_cn_base_url("https://cn.example.org/cn")
        .with_cn_factory("missing");

    let result = SettingsNodeLocator::new(&settings, gateway(&spy), &CNodeFactories::new());

    match result {
        Err(NodeListError::Client(ClientError::UnknownCNodeFactory(key))) => assert_eq!(key, "missing"),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("unknown factory accepted"),
    }
    assert_eq!(spy.count(), 0);
}

#[test]
fn test_settings_locator_propagates_node_list_failure() {
    let spy = SpyExecutor::responding(500, "<html>down</html>");
    let settings = ClientSettings::default().with_cn_base_url("https://cn.example.org/cn");

    let error = SettingsNodeLocator::new(&settings, gateway(&spy), &CNodeFactories::new())
        .err()
        .expect("node list failure");

    assert_eq!(error.kind(), Some(ErrorKind::ServiceFailure));
}
