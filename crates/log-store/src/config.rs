use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const MAX_ENTRY_BYTES: usize = 1024 * 1024;

/// Console log store knobs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogStoreCfg {
    /// JSON-lines mirror; `None` keeps the store purely in memory.
    pub path: Option<PathBuf>,
    pub max_entries: usize,
    pub channel_capacity: usize,
    pub rotate_bytes: u64,
    pub max_entry_bytes: usize,
    pub shutdown_timeout_ms: u64,
    /// Read-time expiry in seconds; 0 keeps everything.
    pub ttl_secs: u64,
}

impl Default for LogStoreCfg {
    fn default() -> Self {
        Self {
            path: None,
            max_entries: 10_000,
            channel_capacity: 10_000,
            rotate_bytes: 50 * 1024 * 1024,
            max_entry_bytes: MAX_ENTRY_BYTES,
            shutdown_timeout_ms: 2_000,
            ttl_secs: 0,
        }
    }
}
