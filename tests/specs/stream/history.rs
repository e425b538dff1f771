//! Persistence specs: history survives restarts but is only replayed on request

use crate::prelude::*;
use serde_json::json;

#[test]
fn restart_from_tail_prints_nothing_old() {
    let node = Node::persistent(TEST1_SCHEMA);
    node.hbd()
        .write_stdin(lines(&[json!({"name": "Test1", "payload": {"foo": "old"}})]))
        .passes();

    node.hbd().write_stdin("").passes().stdout_lacks("old");
}

#[test]
fn from_beginning_replays_history() {
    let node = Node::persistent(TEST1_SCHEMA);
    node.hbd()
        .write_stdin(lines(&[json!({"name": "Test1", "payload": {"foo": "old"}})]))
        .passes();
    assert!(node.path().join("store").join("store.jsonl").exists());

    node.prepend("from_beginning = true");
    let items = node.hbd().write_stdin("").passes().json_lines();

    assert_eq!(items, vec![json!({"name": "Test1", "payload": {"foo": "old"}})]);
}
