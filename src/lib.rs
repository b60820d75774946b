//! Gasoline: a local daemon that captures browser telemetry from the companion extension and
//! serves it to an MCP assistant over stdio or HTTP.

pub mod cli;
pub mod config;
pub mod daemon;
pub mod recordings;
pub mod server;
pub mod ssrf;
pub mod state_dir;
pub mod tools;
