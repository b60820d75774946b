//! Shared primitives for the Gasoline capture daemon.
//!
//! Every crate in the workspace speaks the telemetry model defined here, and tool handlers report
//! failures through [`ToolError`] so the transport can render them uniformly.

pub mod errors;
pub mod telemetry;
pub mod warnings;

pub use errors::{ErrorCode, ToolError, ToolResult};
pub use telemetry::{
    Captured, Direction, EnhancedAction, ExtensionLog, InitiatorType, LogEntry, LogLevel,
    NetworkBody, PerformanceSnapshot, PerformanceTiming, SecurityFlag, TabId, WaterfallEntry,
    WebSocketEvent, WebSocketStatus, WsEventKind,
};
pub use warnings::Warnings;
