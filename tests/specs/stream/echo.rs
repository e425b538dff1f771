//! Stream mode specs: stdin lines are emitted, events are printed

use crate::prelude::*;
use serde_json::json;

#[test]
fn emitted_event_is_printed() {
    let node = Node::with_config(TEST1_SCHEMA);

    let items = node
        .hbd()
        .write_stdin(lines(&[json!({"name": "Test1", "payload": {"foo": "hello", "num": 42}})]))
        .passes()
        .json_lines();

    assert_eq!(
        items,
        vec![json!({"name": "Test1", "payload": {"foo": "hello", "num": 42}})]
    );
}

#[test]
fn events_print_in_input_order() {
    let node = Node::with_config(TEST1_SCHEMA);

    let items = node
        .hbd()
        .write_stdin(lines(&[
            json!({"name": "Test1", "payload": {"num": 1}}),
            json!({"name": "Test1", "payload": {"num": 2}}),
            json!({"name": "Test1", "payload": {"num": 3}}),
        ]))
        .passes()
        .json_lines();

    let nums: Vec<i64> = items
        .iter()
        .map(|item| item["payload"]["num"].as_i64().unwrap())
        .collect();
    assert_eq!(nums, vec![1, 2, 3]);
}

#[test]
fn schema_violation_is_not_emitted() {
    let node = Node::with_config(TEST1_SCHEMA);

    node.hbd()
        .write_stdin(lines(&[
            json!({"name": "Test1", "payload": {"num": "not a number"}}),
            json!({"name": "Test1", "payload": {"foo": "valid"}}),
        ]))
        .passes()
        .stdout_lacks("not a number")
        .stdout_has("valid");
}

#[test]
fn unregistered_event_is_not_emitted() {
    let node = Node::with_config(TEST1_SCHEMA);

    let items = node
        .hbd()
        .write_stdin(lines(&[json!({"name": "Unknown", "payload": {}})]))
        .passes()
        .json_lines();

    assert!(items.is_empty());
}
