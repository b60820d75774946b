use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Pending-query registry limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueriesCfg {
    /// Queued plus taken queries allowed per client.
    pub per_client_limit: usize,
    /// Entries of any state held at once.
    pub max_entries: usize,
    pub default_timeout_ms: u64,
    pub max_timeout_ms: u64,
    /// How long completed, failed and expired entries stay readable.
    pub result_retention_secs: u64,
    pub sweep_interval_ms: u64,
    pub failed_history: usize,
}

impl Default for QueriesCfg {
    fn default() -> Self {
        Self {
            per_client_limit: 256,
            max_entries: 10_000,
            default_timeout_ms: 30_000,
            max_timeout_ms: 10 * 60 * 1_000,
            result_retention_secs: 5 * 60,
            sweep_interval_ms: 500,
            failed_history: 100,
        }
    }
}

impl QueriesCfg {
    /// Missing or zero means the default; anything above the cap is clamped.
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        let max = Duration::from_millis(self.max_timeout_ms);
        match requested {
            Some(t) if !t.is_zero() => t.min(max),
            _ => Duration::from_millis(self.default_timeout_ms).min(max),
        }
    }
}
