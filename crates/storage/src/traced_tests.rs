// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::MemoryStore;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// A writer that captures log output for testing
#[derive(Clone, Default)]
struct CapturedLogs {
    logs: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn contents(&self) -> String {
        let logs = self.logs.lock().unwrap();
        String::from_utf8_lossy(&logs).to_string()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.logs.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run a test with captured tracing output
fn with_tracing<F, Fut>(f: F) -> (String, Fut::Output)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future,
{
    let logs = CapturedLogs::default();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(logs.clone())
        .with_ansi(false)
        .without_time()
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(f())
    });

    (logs.contents(), result)
}

#[tokio::test]
async fn traced_store_passes_calls_through() {
    let traced = TracedStore::new(MemoryStore::new());

    traced.put("k", b"v".to_vec()).await.unwrap();
    assert_eq!(traced.get("k").await.unwrap(), Some(b"v".to_vec()));
    assert_eq!(traced.inner().len(), 1);
}

#[test]
fn traced_put_logs_span_and_key() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedStore::new(MemoryStore::new());
        traced.put("!!PEERS!!", b"[]".to_vec()).await
    });

    assert!(result.is_ok());
    assert!(logs.contains("store.put"), "Should log span name. Logs:\n{}", logs);
    assert!(logs.contains("!!PEERS!!"), "Should log key. Logs:\n{}", logs);
    assert!(logs.contains("elapsed_ms"), "Should log timing. Logs:\n{}", logs);
}

#[test]
fn traced_get_on_closed_store_logs_error() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedStore::new(MemoryStore::new());
        traced.close().await.unwrap();
        traced.get("k").await
    });

    assert!(matches!(result, Err(StoreError::Closed)));
    assert!(logs.contains("get failed"), "Logs:\n{}", logs);
}
