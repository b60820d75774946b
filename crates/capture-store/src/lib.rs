//! In-memory capture of browser telemetry.
//!
//! [`CaptureStore`] owns one ring per stream and the session state. Console logs live in the
//! shared [`gasoline_log_store::LogStore`] so they can be mirrored to disk; every other stream is
//! memory only.

pub mod binary;
pub mod config;
pub mod errors;
pub mod filter;
pub mod security;
pub mod session;
pub mod store;
pub mod websocket;

pub use binary::BinaryFormat;
pub use config::CaptureCfg;
pub use errors::{CaptureError, CaptureResult};
pub use filter::{CaptureFilter, Filterable};
pub use session::{PageOrigins, SecurityMode, SessionState};
pub use store::{
    origin_of, truncate_utf8, Buffer, CapturePage, CaptureStats, CaptureStore, StreamStats,
};
pub use websocket::{ActiveConnection, ClosedConnection, ConnectionTracker, ConnectionsView};
