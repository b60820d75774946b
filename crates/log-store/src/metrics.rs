use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const DROP_REPORT_EVERY: u64 = 1_000;

#[derive(Clone, Default)]
pub struct LogStoreMetrics {
    inner: Arc<LogStoreMetricsInner>,
}

#[derive(Default)]
struct LogStoreMetricsInner {
    accepted: AtomicU64,
    rejected: AtomicU64,
    dropped: AtomicU64,
    written: AtomicU64,
    rewrites: AtomicU64,
    rotations: AtomicU64,
    write_errors: AtomicU64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct LogStoreMetricsSnapshot {
    pub accepted: u64,
    pub rejected: u64,
    pub dropped: u64,
    pub written: u64,
    pub rewrites: u64,
    pub rotations: u64,
    pub write_errors: u64,
}

impl LogStoreMetrics {
    pub fn record_accepted(&self, n: u64) {
        self.inner.accepted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.inner.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts `n` entries that never reached the mirror. Returns the running drop total.
    pub fn record_drop(&self, n: u64) -> u64 {
        let before = self.inner.dropped.fetch_add(n, Ordering::Relaxed);
        let total = before + n;
        if total / DROP_REPORT_EVERY > before / DROP_REPORT_EVERY {
            eprintln!("[log-store][writer] write queue full, {total} entries dropped so far");
        }
        total
    }

    pub fn record_written(&self, n: u64) {
        self.inner.written.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_rewrite(&self) {
        self.inner.rewrites.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rotation(&self) {
        self.inner.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_error(&self) {
        self.inner.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> LogStoreMetricsSnapshot {
        let i = &self.inner;
        LogStoreMetricsSnapshot {
            accepted: i.accepted.load(Ordering::Relaxed),
            rejected: i.rejected.load(Ordering::Relaxed),
            dropped: i.dropped.load(Ordering::Relaxed),
            written: i.written.load(Ordering::Relaxed),
            rewrites: i.rewrites.load(Ordering::Relaxed),
            rotations: i.rotations.load(Ordering::Relaxed),
            write_errors: i.write_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_counter_is_cumulative() {
        let metrics = LogStoreMetrics::default();
        assert_eq!(metrics.record_drop(1), 1);
        assert_eq!(metrics.record_drop(3), 4);
        assert_eq!(metrics.snapshot().dropped, 4);
    }
}
