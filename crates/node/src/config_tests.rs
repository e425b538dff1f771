// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn empty_config_uses_defaults() {
    let config = DaemonConfig::parse("").unwrap();
    assert!(config.store.is_none());
    assert!(config.listen.is_none());
    assert!(config.peers.is_empty());
    assert!(!config.from_beginning);
    assert_eq!(config.options, NodeOptions::default());
}

#[test]
fn full_config_parses() {
    let config = DaemonConfig::parse(
        r#"
store = "/tmp/hb"
from_beginning = true
log_file = "/tmp/hb/hbd.log"

[listen]
port = 7400

[[peers]]
address = "10.0.0.2"
port = 7401

[options]
reconnect_timeout = "250ms"
max_attempts = 3

[events.Test1]
foo = "string"
num = "int"
"#,
    )
    .unwrap();

    assert_eq!(config.store, Some(PathBuf::from("/tmp/hb")));
    assert!(config.from_beginning);
    let listen = config.listen.unwrap();
    assert_eq!(listen.port, 7400);
    assert_eq!(listen.host, "0.0.0.0");
    assert_eq!(config.peers, vec![PeerAddress::new("10.0.0.2", 7401)]);
    assert_eq!(config.options.reconnect_timeout, Duration::from_millis(250));
    assert_eq!(config.options.max_attempts, 3);
    assert_eq!(config.options.close_grace, Duration::from_secs(2));
    assert_eq!(config.events["Test1"]["num"], FieldType::Int);
}

#[yare::parameterized(
    unknown_field_type = { "[events.A]\nx = \"date\"\n" },
    bad_duration = { "[options]\nreconnect_timeout = \"soon\"\n" },
    bad_port = { "[listen]\nport = 70000\n" },
)]
fn invalid_config_is_rejected(content: &str) {
    assert!(DaemonConfig::parse(content).is_err());
}

#[test]
fn load_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = DaemonConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn from_env_overrides_defaults() {
    std::env::set_var("HB_RECONNECT_TIMEOUT_MS", "50");
    std::env::set_var("HB_MAX_ATTEMPTS", "2");
    let options = NodeOptions::from_env();
    std::env::remove_var("HB_RECONNECT_TIMEOUT_MS");
    std::env::remove_var("HB_MAX_ATTEMPTS");

    assert_eq!(options.reconnect_timeout, Duration::from_millis(50));
    assert_eq!(options.max_attempts, 2);
    assert_eq!(options.close_concurrency, 8);
}
