//! Self-link rewriting on reads and on mutation results.

mod common;

use brrtrest::dispatcher::RestRequest;
use common::{
    call_log, dispatcher_for, minion, Completion, LinkFailure, RecordingStorage, TestLinker,
    PREFIX,
};
use http::Method;
use serde_json::Value;
use std::sync::Arc;

fn self_link(value: &Value) -> &str {
    value["metadata"]["selfLink"].as_str().unwrap_or_default()
}

#[test]
fn test_get_links_namespaced_object_with_query() {
    let storage = RecordingStorage::new(call_log()).with_items(vec![minion("ns1", "m1")]);
    let dispatcher = dispatcher_for(Arc::new(storage));

    let response = dispatcher.serve(&RestRequest::new(Method::GET, "/minions/m1?namespace=ns1"));
    assert_eq!(response.status, 200);
    let value = response.object.to_value().unwrap();
    assert_eq!(self_link(&value), format!("{PREFIX}/minions/m1?namespace=ns1"));
}

#[test]
fn test_get_under_ns_path_has_no_namespace_query() {
    let storage = RecordingStorage::new(call_log()).with_items(vec![minion("ns1", "m1")]);
    let dispatcher = dispatcher_for(Arc::new(storage));

    let response = dispatcher.serve(&RestRequest::new(Method::GET, "/ns/ns1/minions/m1"));
    assert_eq!(response.status, 200);
    let value = response.object.to_value().unwrap();
    assert_eq!(self_link(&value), format!("{PREFIX}/ns/ns1/minions/m1"));
}

#[test]
fn test_cluster_scoped_object_has_no_query() {
    let storage = RecordingStorage::new(call_log()).with_items(vec![minion("", "m1")]);
    let dispatcher = dispatcher_for(Arc::new(storage));

    let response = dispatcher.serve(&RestRequest::new(Method::GET, "/minions/m1"));
    let value = response.object.to_value().unwrap();
    assert_eq!(self_link(&value), format!("{PREFIX}/minions/m1"));
}

#[test]
fn test_list_links_collection_and_members_in_order() {
    let storage = RecordingStorage::new(call_log()).with_items(vec![
        minion("ns1", "b"),
        minion("ns2", "a"),
        minion("", "c"),
    ]);
    let dispatcher = dispatcher_for(Arc::new(storage));

    let response = dispatcher.serve(&RestRequest::new(Method::GET, "/minions"));
    assert_eq!(response.status, 200);
    let value = response.object.to_value().unwrap();
    assert_eq!(self_link(&value), format!("{PREFIX}/minions"));

    let items = value["items"].as_array().cloned().unwrap_or_default();
    let links: Vec<&str> = items.iter().map(self_link).collect();
    assert_eq!(
        links,
        vec![
            format!("{PREFIX}/minions/b?namespace=ns1"),
            format!("{PREFIX}/minions/a?namespace=ns2"),
            format!("{PREFIX}/minions/c"),
        ]
    );
}

#[test]
fn test_empty_list_still_gets_a_link() {
    let dispatcher = dispatcher_for(Arc::new(RecordingStorage::new(call_log())));
    let response = dispatcher.serve(&RestRequest::new(Method::GET, "/ns/ns1/minions"));
    assert_eq!(response.status, 200);
    let value = response.object.to_value().unwrap();
    assert_eq!(self_link(&value), format!("{PREFIX}/ns/ns1/minions"));
    assert_eq!(value["items"].as_array().map(Vec::len), Some(0));
}

#[test]
fn test_read_link_failure_is_bad_request() {
    let storage = RecordingStorage::new(call_log()).with_items(vec![minion("ns1", "m1")]);
    let dispatcher = dispatcher_for(Arc::new(storage))
        .with_self_linker(Arc::new(TestLinker::failing(LinkFailure::Name)));

    // The collection link itself needs no name; the members do.
    let response = dispatcher.serve(&RestRequest::new(Method::GET, "/minions"));
    assert_eq!(response.status, 400);
    let value = response.object.to_value().unwrap();
    assert_eq!(value["reason"], "BadRequest");

    let dispatcher = dispatcher_for(Arc::new(
        RecordingStorage::new(call_log()).with_items(vec![minion("ns1", "m1")]),
    ))
    .with_self_linker(Arc::new(TestLinker::failing(LinkFailure::SetSelfLink)));
    let response = dispatcher.serve(&RestRequest::new(Method::GET, "/minions/m1"));
    assert_eq!(response.status, 400);
}

#[test]
fn test_namespace_lookup_failure_on_list_is_single_status() {
    let storage = RecordingStorage::new(call_log()).with_items(vec![minion("ns1", "m1")]);
    let dispatcher = dispatcher_for(Arc::new(storage))
        .with_self_linker(Arc::new(TestLinker::failing(LinkFailure::Namespace)));

    let response = dispatcher.serve(&RestRequest::new(Method::GET, "/minions"));
    assert_eq!(response.status, 400);
    let value = response.object.to_value().unwrap();
    assert_eq!(value["kind"], "Status");
    assert_eq!(value["reason"], "BadRequest");
    // No partially linked collection leaks out.
    assert!(value.get("items").is_none());
}

#[test]
fn test_namespace_lookup_failure_on_create_keeps_created() {
    let linker = Arc::new(TestLinker::failing(LinkFailure::Namespace));
    let dispatcher =
        dispatcher_for(Arc::new(RecordingStorage::new(call_log()))).with_self_linker(linker.clone());

    let response = dispatcher.serve(
        &RestRequest::new(Method::POST, "/minions")
            .with_body(r#"{"metadata":{"name":"m1","namespace":"ns1"}}"#),
    );
    assert_eq!(response.status, 201);
    let value = response.object.to_value().unwrap();
    assert_eq!(value["metadata"]["name"], "m1");
    assert_eq!(self_link(&value), "");
    assert_eq!(linker.set_calls(), 0);
}

#[test]
fn test_create_links_result_with_its_name() {
    let dispatcher = dispatcher_for(Arc::new(RecordingStorage::new(call_log())));

    let response = dispatcher.serve(
        &RestRequest::new(Method::POST, "/minions")
            .with_body(r#"{"metadata":{"name":"m1","namespace":"ns1"},"host_ip":"10.0.0.1"}"#),
    );
    assert_eq!(response.status, 201);
    let value = response.object.to_value().unwrap();
    assert_eq!(self_link(&value), format!("{PREFIX}/minions/m1?namespace=ns1"));
    assert_eq!(value["host_ip"], "10.0.0.1");
}

#[test]
fn test_update_links_result_to_request_path() {
    let dispatcher = dispatcher_for(Arc::new(RecordingStorage::new(call_log())));

    let response = dispatcher.serve(
        &RestRequest::new(Method::PUT, "/ns/ns1/minions/m1")
            .with_body(r#"{"metadata":{"name":"m1","namespace":"ns1"}}"#),
    );
    assert_eq!(response.status, 200);
    let value = response.object.to_value().unwrap();
    assert_eq!(self_link(&value), format!("{PREFIX}/ns/ns1/minions/m1"));
}

#[test]
fn test_mutation_link_failure_is_only_logged() {
    for failure in [
        LinkFailure::Name,
        LinkFailure::SetSelfLink,
        LinkFailure::Namespace,
    ] {
        let dispatcher = dispatcher_for(Arc::new(RecordingStorage::new(call_log())))
            .with_self_linker(Arc::new(TestLinker::failing(failure)));

        let created = dispatcher.serve(
            &RestRequest::new(Method::POST, "/minions")
                .with_body(r#"{"metadata":{"name":"m1","namespace":"ns1"}}"#),
        );
        assert_eq!(created.status, 201, "{failure:?}");
        assert_eq!(self_link(&created.object.to_value().unwrap()), "");

        let updated = dispatcher.serve(
            &RestRequest::new(Method::PUT, "/minions/m1")
                .with_body(r#"{"metadata":{"name":"m1","namespace":"ns1"}}"#),
        );
        assert_eq!(updated.status, 200, "{failure:?}");
        let link = self_link(&updated.object.to_value().unwrap()).to_string();
        match failure {
            // Update links never need the name.
            LinkFailure::Name => assert_eq!(link, format!("{PREFIX}/minions/m1?namespace=ns1")),
            LinkFailure::SetSelfLink | LinkFailure::Namespace => assert_eq!(link, ""),
        }
    }
}

#[test]
fn test_each_result_is_rewritten_once() {
    let linker = Arc::new(TestLinker::default());
    let storage = RecordingStorage::new(call_log()).with_items(vec![
        minion("ns1", "a"),
        minion("ns1", "b"),
    ]);
    let dispatcher = dispatcher_for(Arc::new(storage)).with_self_linker(linker.clone());

    dispatcher.serve(&RestRequest::new(Method::GET, "/minions"));
    // The collection plus one per member.
    assert_eq!(linker.set_calls(), 3);

    dispatcher.serve(&RestRequest::new(Method::GET, "/minions/a"));
    assert_eq!(linker.set_calls(), 4);

    dispatcher.serve(
        &RestRequest::new(Method::POST, "/minions")
            .with_body(r#"{"metadata":{"name":"c","namespace":"ns1"}}"#),
    );
    assert_eq!(linker.set_calls(), 5);
}

#[test]
fn test_embedded_failure_result_keeps_status() {
    let storage = RecordingStorage::new(call_log()).with_completion(Completion::Embedded(
        brrtrest::ApiError::invalid("minions", "m1", "name is taken"),
    ));
    let dispatcher = dispatcher_for(Arc::new(storage));

    let response = dispatcher.serve(
        &RestRequest::new(Method::POST, "/minions").with_body(r#"{"metadata":{"name":"m1"}}"#),
    );
    // A Status carries no metadata, so the failed rewrite is logged and the code survives.
    assert_eq!(response.status, 422);
    let value = response.object.to_value().unwrap();
    assert_eq!(value["kind"], "Status");
}
