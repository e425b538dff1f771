//! Startup error specs

use crate::prelude::*;

#[test]
fn missing_argument_prints_usage() {
    hbd().fails().stderr_has("usage: hbd <config.toml>");
}

#[test]
fn missing_config_file_fails() {
    let node = Node::with_config("");
    std::fs::remove_file(node.config_path()).unwrap();

    node.hbd().fails().stderr_has("failed to read");
}

#[test]
fn invalid_config_fails() {
    let node = Node::with_config("[events.Test1]\nfoo = \"date\"\n");

    node.hbd().fails().stderr_has("invalid config");
}

#[test]
fn empty_input_exits_cleanly() {
    let node = Node::with_config(TEST1_SCHEMA);

    node.hbd().write_stdin("").passes();
}
