// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write as _;

#[test]
fn wal_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.jsonl");

    {
        let (mut wal, replay) = Wal::open(&path).unwrap();
        assert!(replay.entries.is_empty());
        wal.append("!!STOREID!!", b"abc").unwrap();
        wal.append("!!PEERS!!", b"[]").unwrap();
    }

    let (_, replay) = Wal::open(&path).unwrap();
    assert_eq!(replay.entries.len(), 2);
    assert_eq!(replay.entries["!!STOREID!!"], b"abc");
    assert_eq!(replay.truncated, 0);
}

#[test]
fn later_put_overwrites_earlier() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.jsonl");

    {
        let (mut wal, _) = Wal::open(&path).unwrap();
        wal.append("k", b"one").unwrap();
        wal.append("k", b"two").unwrap();
    }

    let (_, replay) = Wal::open(&path).unwrap();
    assert_eq!(replay.entries["k"], b"two");
}

#[test]
fn wal_sequence_continues() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.jsonl");

    {
        let (mut wal, _) = Wal::open(&path).unwrap();
        assert_eq!(wal.sequence(), 0);
        wal.append("x", b"1").unwrap();
        assert_eq!(wal.sequence(), 1);
    }

    let (mut wal, _) = Wal::open(&path).unwrap();
    assert_eq!(wal.sequence(), 1);
    assert_eq!(wal.append("y", b"2").unwrap(), 2);
}

#[test]
fn torn_tail_is_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.jsonl");

    {
        let (mut wal, _) = Wal::open(&path).unwrap();
        wal.append("kept", b"yes").unwrap();
    }
    let valid_len = std::fs::metadata(&path).unwrap().len();
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{{\"seq\":2,\"key\":\"lost\"").unwrap();
    }

    let (mut wal, replay) = Wal::open(&path).unwrap();
    assert_eq!(replay.entries.len(), 1);
    assert!(replay.truncated > 0);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), valid_len);

    // Appends after recovery land on a clean line
    wal.append("next", b"ok").unwrap();
    drop(wal);
    let (_, replay) = Wal::open(&path).unwrap();
    assert_eq!(replay.entries["next"], b"ok");
}

#[test]
fn checksum_mismatch_stops_replay() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.jsonl");

    {
        let (mut wal, _) = Wal::open(&path).unwrap();
        wal.append("a", b"1").unwrap();
    }
    {
        let mut entry = WalEntry::new(2, "b", b"2");
        entry.checksum ^= 1;
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{}", serde_json::to_string(&entry).unwrap()).unwrap();
    }

    let (_, replay) = Wal::open(&path).unwrap();
    assert!(replay.entries.contains_key("a"));
    assert!(!replay.entries.contains_key("b"));
    assert_eq!(replay.sequence, 1);
}

#[yare::parameterized(
    garbage = { "not json" },
    wrong_shape = { r#"{"seq":1}"# },
)]
fn unparsable_line_reports_corruption(line: &str) {
    assert!(matches!(
        Wal::parse_line(line, 3),
        Err(WalError::Corrupted { line: 3, .. })
    ));
}

#[test]
fn entry_checksum_covers_value() {
    let mut entry = WalEntry::new(1, "k", b"v");
    assert!(entry.verify());
    entry.value = hex::encode(b"w");
    assert!(!entry.verify());
}

#[test]
fn wal_error_maps_into_store_error() {
    let err: StoreError = WalError::ChecksumMismatch { line: 4 }.into();
    assert!(matches!(err, StoreError::Corrupt { .. }));
}
