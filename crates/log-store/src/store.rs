use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use gasoline_core_types::{Captured, LogEntry, LogLevel, Warnings};
use gasoline_ring::{Cursor, PageRequest, RingBuffer};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::LogStoreCfg;
use crate::errors::{LogStoreError, LogStoreResult};
use crate::metrics::LogStoreMetrics;
use crate::validate::validate_entry;
use crate::writer::{self, WriterHandle};

/// Console log query. Empty `levels` means every level.
#[derive(Clone, Debug, Default)]
pub struct LogQuery {
    pub after: Option<Cursor>,
    pub levels: Vec<LogLevel>,
    /// Case-insensitive substring over `message` and `args`.
    pub contains: Option<String>,
    /// Case-sensitive substring over `url`/`source`.
    pub url: Option<String>,
    pub tab_id: Option<u64>,
    pub limit: usize,
    pub restart_on_eviction: bool,
    pub max_age: Option<Duration>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LogPage {
    pub entries: Vec<Captured<LogEntry>>,
    pub cursor: Cursor,
    pub evicted: u64,
    pub restarted: bool,
    pub total: usize,
}

pub struct LogStore {
    cfg: LogStoreCfg,
    ring: RwLock<RingBuffer<LogEntry>>,
    writer: Option<WriterHandle>,
    metrics: LogStoreMetrics,
    warnings: Warnings,
}

impl LogStore {
    pub fn in_memory(cfg: LogStoreCfg, warnings: Warnings) -> Self {
        Self {
            ring: RwLock::new(RingBuffer::new(cfg.max_entries)),
            cfg: LogStoreCfg { path: None, ..cfg },
            writer: None,
            metrics: LogStoreMetrics::default(),
            warnings,
        }
    }

    /// Opens the store, reloading any existing mirror before the writer starts.
    pub fn open(cfg: LogStoreCfg, warnings: Warnings) -> LogStoreResult<Self> {
        let Some(path) = cfg.path.clone() else {
            return Ok(Self::in_memory(cfg, warnings));
        };
        let mut ring = RingBuffer::new(cfg.max_entries);
        let loaded = load_mirror(&path, cfg.max_entries, &warnings)?;
        let reloaded = loaded.len();
        ring.write(loaded);
        let metrics = LogStoreMetrics::default();
        let writer = writer::spawn(&cfg, path.clone(), metrics.clone(), warnings.clone())?;
        info!(path = %path.display(), reloaded, "console log store opened");
        Ok(Self {
            cfg,
            ring: RwLock::new(ring),
            writer: Some(writer),
            metrics,
            warnings,
        })
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.cfg.path.as_ref()
    }

    pub fn metrics(&self) -> &LogStoreMetrics {
        &self.metrics
    }

    /// Validates the whole batch first; a single bad entry rejects all of it.
    pub fn add_entries(&self, entries: Vec<LogEntry>) -> LogStoreResult<usize> {
        for (index, entry) in entries.iter().enumerate() {
            if let Err(err) = validate_entry(index, entry, self.cfg.max_entry_bytes) {
                self.metrics.record_rejected();
                return Err(err);
            }
        }
        if entries.is_empty() {
            return Ok(0);
        }
        let count = entries.len();

        // Mirror commands are queued under the ring lock so the file sees batches in memory order.
        let queued = {
            let mut ring = self.ring.write();
            let truncated = ring.len() + count > ring.capacity();
            ring.write(entries.iter().cloned());
            self.writer.as_ref().map(|writer| {
                if truncated {
                    writer.rewrite(ring.read_all())
                } else {
                    writer.append(entries)
                }
            })
        };
        self.metrics.record_accepted(count as u64);

        if let Some(Err(err)) = queued {
            debug!(?err, "console mirror write not queued");
            if matches!(err, LogStoreError::Closed) {
                self.warnings
                    .push("console log mirror writer has stopped; entries are kept in memory only");
            }
        }
        Ok(count)
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        match self.ttl() {
            Some(ttl) => self.entries_within(ttl),
            None => self.ring.read().read_all(),
        }
    }

    pub fn entries_within(&self, max_age: Duration) -> Vec<LogEntry> {
        let since = Utc::now() - max_age;
        self.ring.read().read_since(since)
    }

    pub fn len(&self) -> usize {
        self.ring.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.read().capacity()
    }

    pub fn position(&self) -> u64 {
        self.ring.read().position()
    }

    pub fn read_page(&self, query: &LogQuery) -> LogPage {
        let since = earliest(query.max_age, self.ttl());
        let req = PageRequest {
            after: query.after,
            since,
            limit: query.limit,
            restart_on_eviction: query.restart_on_eviction,
        };
        let needle = query.contains.as_ref().map(|s| s.to_lowercase());
        let ring = self.ring.read();
        let page = ring.page(&req, |entry| matches_query(entry, query, needle.as_deref()));
        let total = ring.len();
        drop(ring);
        LogPage {
            entries: page
                .items
                .into_iter()
                .map(|e| Captured {
                    seq: e.position,
                    ingested_at: e.added_at,
                    item: e.item,
                })
                .collect(),
            cursor: page.cursor,
            evicted: page.evicted,
            restarted: page.restarted,
            total,
        }
    }

    /// Empties memory and truncates the mirror. Returns the number removed.
    pub fn clear(&self) -> usize {
        let mut ring = self.ring.write();
        let removed = ring.clear();
        if let Some(writer) = &self.writer {
            if let Err(err) = writer.rewrite(Vec::new()) {
                warn!(?err, "console mirror truncate not queued");
            }
        }
        removed
    }

    pub fn flush(&self) -> LogStoreResult<()> {
        match &self.writer {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }

    /// Stops the mirror writer and reports any entries it never received.
    pub fn shutdown(&self) {
        if let Some(writer) = &self.writer {
            if !writer.shutdown() {
                warn!("console log writer did not drain before the shutdown timeout");
            }
            let dropped = self.metrics.dropped();
            if dropped > 0 {
                warn!(dropped, "console mirror dropped entries while the write queue was full");
                self.warnings
                    .push(format!("console mirror dropped {dropped} entries"));
            }
        }
    }

    fn ttl(&self) -> Option<Duration> {
        (self.cfg.ttl_secs > 0).then(|| Duration::seconds(self.cfg.ttl_secs as i64))
    }
}

fn earliest(a: Option<Duration>, b: Option<Duration>) -> Option<DateTime<Utc>> {
    let age = match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }?;
    Some(Utc::now() - age)
}

fn matches_query(entry: &LogEntry, query: &LogQuery, needle: Option<&str>) -> bool {
    if !query.levels.is_empty() {
        let level = entry
            .get("level")
            .and_then(Value::as_str)
            .and_then(LogLevel::parse);
        match level {
            Some(level) if query.levels.contains(&level) => {}
            _ => return false,
        }
    }
    if let Some(tab) = query.tab_id.filter(|t| *t != 0) {
        if entry.get("tab_id").and_then(Value::as_u64) != Some(tab) {
            return false;
        }
    }
    if let Some(url) = &query.url {
        let hit = ["url", "source"].iter().any(|key| {
            entry
                .get(*key)
                .and_then(Value::as_str)
                .map_or(false, |v| v.contains(url.as_str()))
        });
        if !hit {
            return false;
        }
    }
    if let Some(needle) = needle {
        return message_text(entry).to_lowercase().contains(needle);
    }
    true
}

/// `message` plus any `args`, the way the extension splits console calls.
pub fn message_text(entry: &LogEntry) -> String {
    let mut text = entry
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if let Some(Value::Array(args)) = entry.get("args") {
        for arg in args {
            if !text.is_empty() {
                text.push(' ');
            }
            match arg {
                Value::String(s) => text.push_str(s),
                other => text.push_str(&other.to_string()),
            }
        }
    }
    text
}

fn load_mirror(path: &Path, max_entries: usize, warnings: &Warnings) -> LogStoreResult<Vec<LogEntry>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    let mut ring = RingBuffer::new(max_entries);
    let mut skipped = 0usize;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(&line) {
            Ok(Value::Object(entry)) => {
                ring.write_one(entry);
            }
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(skipped, path = %path.display(), "skipped malformed console mirror lines");
        warnings.push(format!(
            "skipped {skipped} malformed lines while reloading {}",
            path.display()
        ));
    }
    Ok(ring.read_all())
}

impl Drop for LogStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(level: &str, message: &str) -> LogEntry {
        json!({"level": level, "message": message})
            .as_object()
            .cloned()
            .expect("object")
    }

    fn store(max: usize) -> LogStore {
        LogStore::in_memory(
            LogStoreCfg {
                max_entries: max,
                ..LogStoreCfg::default()
            },
            Warnings::new(),
        )
    }

    #[test]
    fn bad_entry_rejects_whole_batch() {
        let store = store(10);
        let mut bad = entry("log", "x");
        bad.remove("level");
        let err = store
            .add_entries(vec![entry("log", "ok"), bad])
            .expect_err("batch rejected");
        assert_eq!(err, LogStoreError::MissingLevel { index: 1 });
        assert!(store.is_empty());
    }

    #[test]
    fn truncates_from_front() {
        let store = store(3);
        store
            .add_entries((0..5).map(|i| entry("log", &i.to_string())).collect())
            .expect("add");
        let messages: Vec<String> = store
            .entries()
            .iter()
            .map(|e| e["message"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(messages, vec!["2", "3", "4"]);
    }

    #[test]
    fn page_filters_levels_and_text() {
        let store = store(10);
        store
            .add_entries(vec![
                entry("error", "Boom happened"),
                entry("log", "boom again"),
                entry("error", "other"),
            ])
            .expect("add");
        let page = store.read_page(&LogQuery {
            levels: vec![LogLevel::Error],
            contains: Some("BOOM".into()),
            ..LogQuery::default()
        });
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].seq, 0);
        assert_eq!(page.cursor.position, 3);
    }

    #[test]
    fn message_text_joins_args() {
        let e = json!({"level": "log", "args": ["a", 1, {"k": true}]})
            .as_object()
            .cloned()
            .expect("object");
        assert_eq!(message_text(&e), "a 1 {\"k\":true}");
    }

    #[test]
    fn entries_within_excludes_old_entries() {
        let store = store(10);
        store.add_entries(vec![entry("log", "old")]).expect("add");
        std::thread::sleep(std::time::Duration::from_millis(30));
        store.add_entries(vec![entry("log", "new")]).expect("add");
        let recent = store.entries_within(Duration::milliseconds(15));
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0]["message"], "new");
    }
}
