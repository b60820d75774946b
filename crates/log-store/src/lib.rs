//! Console log store: a bounded in-memory ring mirrored to a JSON-lines file.
//!
//! Validation and ring updates happen on the caller's thread under a short write lock. Disk I/O is
//! handed to a single `log-store-writer` thread over a bounded channel; when that channel is full
//! the entry stays in memory and the mirror misses it ([`LogStoreError::Dropped`]).

pub mod config;
pub mod errors;
pub mod metrics;
pub mod store;
pub mod validate;
pub mod writer;

pub use config::{LogStoreCfg, MAX_ENTRY_BYTES};
pub use errors::{LogStoreError, LogStoreResult};
pub use metrics::{LogStoreMetrics, LogStoreMetricsSnapshot};
pub use store::{message_text, LogPage, LogQuery, LogStore};
pub use validate::validate_entry;
