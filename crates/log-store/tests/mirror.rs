use std::fs;

use gasoline_core_types::{LogEntry, Warnings};
use gasoline_log_store::{LogQuery, LogStore, LogStoreCfg};
use serde_json::json;

fn entry(message: &str) -> LogEntry {
    json!({"level": "info", "message": message})
        .as_object()
        .cloned()
        .expect("object")
}

fn cfg(path: std::path::PathBuf, max_entries: usize) -> LogStoreCfg {
    LogStoreCfg {
        path: Some(path),
        max_entries,
        ..LogStoreCfg::default()
    }
}

#[test]
fn entries_survive_a_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("logs.jsonl");
    {
        let store = LogStore::open(cfg(path.clone(), 100), Warnings::new()).expect("open");
        store
            .add_entries(vec![entry("one"), entry("two")])
            .expect("add");
        store.flush().expect("flush");
        store.shutdown();
    }
    let reopened = LogStore::open(cfg(path, 100), Warnings::new()).expect("reopen");
    let messages: Vec<String> = reopened
        .entries()
        .iter()
        .map(|e| e["message"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(messages, vec!["one", "two"]);
}

#[test]
fn truncation_rewrites_the_mirror() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("logs.jsonl");
    let store = LogStore::open(cfg(path.clone(), 2), Warnings::new()).expect("open");
    store
        .add_entries(vec![entry("a"), entry("b"), entry("c")])
        .expect("add");
    store.flush().expect("flush");
    let text = fs::read_to_string(&path).expect("read");
    assert_eq!(text.lines().count(), 2);
    assert!(!text.contains("\"a\""));
}

#[test]
fn malformed_lines_are_skipped_with_a_warning() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("logs.jsonl");
    fs::write(
        &path,
        "{\"level\":\"log\",\"message\":\"kept\"}\nnot json\n[1,2]\n",
    )
    .expect("seed");
    let warnings = Warnings::new();
    let store = LogStore::open(cfg(path, 10), warnings.clone()).expect("open");
    assert_eq!(store.len(), 1);
    let drained = warnings.drain();
    assert_eq!(drained.len(), 1);
    assert!(drained[0].contains("skipped 2 malformed lines"));
}

#[test]
fn clear_truncates_memory_and_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("logs.jsonl");
    let store = LogStore::open(cfg(path.clone(), 10), Warnings::new()).expect("open");
    store.add_entries(vec![entry("gone")]).expect("add");
    assert_eq!(store.clear(), 1);
    store.flush().expect("flush");
    assert!(store.is_empty());
    assert_eq!(fs::read_to_string(&path).expect("read"), "");

    store.add_entries(vec![entry("fresh")]).expect("add");
    let page = store.read_page(&LogQuery::default());
    assert_eq!(page.entries.len(), 1);
    assert_eq!(page.entries[0].seq, 1);
}

#[test]
fn dropped_mirror_writes_warn_once_on_shutdown() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("logs.jsonl");
    let warnings = Warnings::new();
    let store = LogStore::open(
        LogStoreCfg {
            channel_capacity: 1,
            ..cfg(path, 50)
        },
        warnings.clone(),
    )
    .expect("open");
    // Past capacity every batch becomes a synced rewrite, which the flood outpaces.
    for i in 0..2_000 {
        store.add_entries(vec![entry(&i.to_string())]).expect("accepted");
        if store.metrics().dropped() > 0 && i >= 100 {
            break;
        }
    }
    let dropped = store.metrics().dropped();
    assert!(dropped > 0);
    assert_eq!(store.len(), 50);

    store.shutdown();
    assert_eq!(
        warnings.drain(),
        vec![format!("console mirror dropped {dropped} entries")]
    );
    store.shutdown();
    assert!(warnings.is_empty());
}
