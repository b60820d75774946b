//! `generate`: artifacts derived from captured traffic.

use gasoline_core_types::{ToolError, ToolResult};
use gasoline_csp::{CspMode, CspParams};
use serde_json::Value;

use super::args::Args;
use super::to_json;
use crate::daemon::Daemon;

pub(crate) const FORMATS: [&str; 1] = ["csp"];

pub(crate) fn run(daemon: &Daemon, args: Args<'_>) -> ToolResult<Value> {
    args.mode("format", &FORMATS)?;
    let mode = match args.str("mode")? {
        None => CspMode::default(),
        Some(raw) => raw
            .parse::<CspMode>()
            .map_err(|_| ToolError::unknown_mode("mode", raw, &CspMode::NAMES))?,
    };
    let params = CspParams {
        mode,
        include_report_uri: args.bool("include_report_uri")?,
        exclude_origins: args.strings("exclude_origins")?,
    };
    to_json(&daemon.origins().generate(&params))
}
