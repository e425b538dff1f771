// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use tokio::io::BufReader;

const SCHEMA: &str = r#"
[events.Test1]
foo = "string"
num = "int"
"#;

async fn run_lines(config: DaemonConfig, input: &str) -> Vec<Value> {
    let mut output = Vec::new();
    let reader = BufReader::new(input.as_bytes());
    tokio::time::timeout(
        Duration::from_secs(5),
        run(config, reader, &mut output, std::future::pending()),
    )
    .await
    .unwrap()
    .unwrap();

    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn input_lines_are_emitted_and_echoed() {
    let config = DaemonConfig::parse(SCHEMA).unwrap();
    let items = run_lines(
        config,
        "{\"name\":\"Test1\",\"payload\":{\"foo\":\"hello\",\"num\":42}}\n\
         {\"name\":\"Test1\",\"payload\":{\"foo\":\"again\",\"num\":1}}\n",
    )
    .await;

    assert_eq!(
        items,
        vec![
            serde_json::json!({"name": "Test1", "payload": {"foo": "hello", "num": 42}}),
            serde_json::json!({"name": "Test1", "payload": {"foo": "again", "num": 1}}),
        ]
    );
}

#[yare::parameterized(
    not_json = { "garbage\n" },
    unknown_event = { "{\"name\":\"Other\",\"payload\":{}}\n" },
    schema_violation = { "{\"name\":\"Test1\",\"payload\":{\"num\":\"x\"}}\n" },
    blank = { "\n\n" },
)]
fn rejected_lines_produce_no_output(input: &str) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let items = runtime.block_on(run_lines(DaemonConfig::parse(SCHEMA).unwrap(), input));
    assert!(items.is_empty());
}

#[tokio::test]
async fn file_store_keeps_history_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let config = format!("store = {:?}\n{}", dir.path().display().to_string(), SCHEMA);

    let first = run_lines(
        DaemonConfig::parse(&config).unwrap(),
        "{\"name\":\"Test1\",\"payload\":{\"foo\":\"kept\",\"num\":7}}\n",
    )
    .await;
    assert_eq!(first.len(), 1);

    // From the tail a restart sees nothing old
    let tail = run_lines(DaemonConfig::parse(&config).unwrap(), "").await;
    assert!(tail.is_empty());

    let replay_config = format!("from_beginning = true\n{}", config);
    let replay = run_lines(DaemonConfig::parse(&replay_config).unwrap(), "").await;
    assert_eq!(replay, first);
}

#[tokio::test]
async fn shutdown_ends_a_node_with_open_input() {
    let (_writer, reader) = tokio::io::duplex(64);
    let mut output = Vec::new();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        run(
            DaemonConfig::default(),
            BufReader::new(reader),
            &mut output,
            tokio::time::sleep(Duration::from_millis(50)),
        ),
    )
    .await
    .unwrap();
    assert!(result.is_ok());
    assert!(output.is_empty());
}

#[tokio::test]
async fn store_path_that_is_a_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("plain-file");
    std::fs::write(&file, b"not a directory").unwrap();

    let config = DaemonConfig {
        store: Some(file),
        ..DaemonConfig::default()
    };
    let result = run(
        config,
        BufReader::new(&b""[..]),
        Vec::new(),
        std::future::pending(),
    )
    .await;
    assert!(matches!(result, Err(DaemonError::Store(_))));
}
