//! Shared helpers for hbd specs

use assert_cmd::assert::Assert;
use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;

pub const TEST1_SCHEMA: &str = r#"
[events.Test1]
foo = "string"
num = "int"
"#;

static BUILD: Once = Once::new();

/// Path of the hbd binary, building it when the workspace has not
fn hbd_path() -> PathBuf {
    let path = assert_cmd::cargo::cargo_bin("hbd");
    BUILD.call_once(|| {
        if path.exists() {
            return;
        }
        let cargo = std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
        let status = std::process::Command::new(cargo)
            .args(["build", "-p", "hb-node", "--bin", "hbd"])
            .status()
            .unwrap();
        assert!(status.success(), "failed to build hbd");
    });
    path
}

/// A scratch directory holding one node's config and store
pub struct Node {
    dir: TempDir,
}

impl Node {
    /// Node with a memory store and the given extra config
    pub fn with_config(config: &str) -> Self {
        let node = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        node.write_config(config);
        node
    }

    /// Node whose store lives in its scratch directory
    pub fn persistent(config: &str) -> Self {
        let node = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        let store = node.dir.path().join("store");
        node.write_config(&format!("store = {:?}\n{}", store.display().to_string(), config));
        node
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("hbd.toml")
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_config(&self, config: &str) {
        std::fs::write(self.config_path(), config).unwrap();
    }

    /// Prepend `line` to the config
    pub fn prepend(&self, line: &str) {
        let config = std::fs::read_to_string(self.config_path()).unwrap();
        self.write_config(&format!("{}\n{}", line, config));
    }

    pub fn hbd(&self) -> Command {
        let mut cmd = hbd();
        cmd.arg(self.config_path());
        cmd
    }
}

pub fn hbd() -> Command {
    let mut cmd = Command::new(hbd_path());
    cmd.env("RUST_LOG", "warn")
        .timeout(std::time::Duration::from_secs(20));
    cmd
}

/// Encode `{name, payload}` input lines
pub fn lines(events: &[serde_json::Value]) -> String {
    events.iter().map(|event| format!("{}\n", event)).collect()
}

pub trait CommandExt {
    fn passes(&mut self) -> Output;
    fn fails(&mut self) -> Output;
}

impl CommandExt for Command {
    fn passes(&mut self) -> Output {
        Output(self.assert().success())
    }

    fn fails(&mut self) -> Output {
        Output(self.assert().failure())
    }
}

pub struct Output(Assert);

impl Output {
    pub fn stdout_has(self, needle: &str) -> Self {
        Output(self.0.stdout(predicates::str::contains(needle)))
    }

    pub fn stdout_lacks(self, needle: &str) -> Self {
        Output(self.0.stdout(predicates::str::contains(needle).not()))
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        Output(self.0.stderr(predicates::str::contains(needle)))
    }

    /// stdout parsed as one JSON value per line
    pub fn json_lines(self) -> Vec<serde_json::Value> {
        let stdout = String::from_utf8(self.0.get_output().stdout.clone()).unwrap();
        stdout
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}
