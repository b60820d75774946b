//! `analyze`: contract validation, noise statistics and extension-side inspections.

use gasoline_api_contract::ContractFilter;
use gasoline_core_types::{ToolError, ToolResult};
use gasoline_mcp::ToolCall;
use serde_json::{json, Value};

use super::args::Args;
use super::commands::{queue_command, CONTROL_KEYS};
use super::to_json;
use crate::daemon::Daemon;

pub(crate) const MODES: [&str; 4] = ["api_validation", "dom", "accessibility", "noise_stats"];
const OPERATIONS: [&str; 3] = ["analyze", "report", "clear"];

pub(crate) async fn run(daemon: &Daemon, call: &ToolCall, args: Args<'_>) -> ToolResult<Value> {
    match args.mode("what", &MODES)? {
        "api_validation" => api_validation(daemon, args),
        "dom" => {
            args.required_str("selector")?;
            queue_command(daemon, call, args, "dom", args.without(&CONTROL_KEYS)).await
        }
        "accessibility" => queue_command(daemon, call, args, "a11y", args.without(&CONTROL_KEYS)).await,
        "noise_stats" => {
            let noise = daemon.noise();
            Ok(json!({
                "statistics": noise.statistics(),
                "rule_count": noise.rule_count(),
            }))
        }
        other => Err(ToolError::unknown_mode("what", other, &MODES)),
    }
}

fn api_validation(daemon: &Daemon, args: Args<'_>) -> ToolResult<Value> {
    let operation = match args.str("operation")? {
        None => "analyze",
        Some(op) if OPERATIONS.contains(&op) => op,
        Some(other) => return Err(ToolError::unknown_mode("operation", other, &OPERATIONS)),
    };
    let filter = ContractFilter {
        url: args.str("url")?.map(str::to_string),
        ignore_endpoints: args.strings("ignore_endpoints")?,
    };
    let contracts = daemon.contracts();
    match operation {
        "report" => to_json(&contracts.report(&filter)),
        "clear" => Ok(json!({ "cleared": contracts.clear() })),
        _ => to_json(&contracts.analyze(&filter)),
    }
}
