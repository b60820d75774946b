//! `configure`: buffer maintenance, noise rules, overrides and health.

use gasoline_capture_store::{Buffer, CaptureError, CaptureFilter};
use gasoline_core_types::{ToolError, ToolResult};
use gasoline_noise::{NewRule, NoiseCategory};
use serde_json::{json, Value};
use tracing::info;

use super::args::Args;
use crate::daemon::Daemon;

pub(crate) const ACTIONS: [&str; 4] = ["clear", "noise_rule", "health", "override"];
pub(crate) const NOISE_ACTIONS: [&str; 6] = ["add", "remove", "list", "reset", "dismiss", "auto_detect"];

pub(crate) fn run(daemon: &Daemon, args: Args<'_>) -> ToolResult<Value> {
    match args.mode("action", &ACTIONS)? {
        "clear" => clear(daemon, args),
        "noise_rule" => noise_rule(daemon, args),
        "health" => Ok(daemon.health()),
        "override" => set_override(daemon, args),
        other => Err(ToolError::unknown_mode("action", other, &ACTIONS)),
    }
}

fn clear(daemon: &Daemon, args: Args<'_>) -> ToolResult<Value> {
    let raw = args.str("buffer")?.unwrap_or("all");
    let buffer: Buffer = raw
        .parse()
        .map_err(|_| ToolError::unknown_mode("buffer", raw, &Buffer::NAMES))?;
    if buffer == Buffer::All {
        let summary = daemon.clear_all();
        return Ok(json!({
            "cleared": buffer.as_str(),
            "removed": summary.buffers,
            "endpoints": summary.endpoints,
            "queries": summary.queries,
        }));
    }
    let removed = daemon.capture().clear(buffer);
    info!(buffer = buffer.as_str(), removed, "buffer cleared");
    Ok(json!({ "cleared": buffer.as_str(), "removed": removed }))
}

fn noise_rule(daemon: &Daemon, args: Args<'_>) -> ToolResult<Value> {
    let noise = daemon.noise();
    match args.mode("noise_action", &NOISE_ACTIONS)? {
        "add" => {
            let mut rules: Vec<NewRule> = args.parse("rules")?.unwrap_or_default();
            if let Some(rule) = args.parse::<NewRule>("rule")? {
                rules.push(rule);
            }
            if rules.is_empty() {
                return Err(ToolError::missing_param("rules"));
            }
            let added = noise.add_rules(rules)?;
            Ok(json!({ "added": added, "rule_count": noise.rule_count() }))
        }
        "remove" => {
            let removed = noise.remove_rule(args.required_str("rule_id")?)?;
            Ok(json!({ "removed": removed, "rule_count": noise.rule_count() }))
        }
        "list" => {
            let rules = noise.list_rules();
            Ok(json!({ "count": rules.len(), "rules": rules }))
        }
        "reset" => Ok(json!({ "removed": noise.reset(), "rule_count": noise.rule_count() })),
        "dismiss" => {
            let pattern = args.required_str("pattern")?;
            let raw = args.str("category")?.unwrap_or("console");
            let category: NoiseCategory = raw
                .parse()
                .map_err(|_| ToolError::unknown_mode("category", raw, &NoiseCategory::NAMES))?;
            let reason = args.str("reason")?.map(str::to_string);
            let rule = noise.dismiss(pattern, category, reason)?;
            Ok(json!({ "rule": rule }))
        }
        "auto_detect" => {
            let apply = args.bool("apply")?;
            let capture = daemon.capture();
            let console = capture.log_store().entries();
            let network: Vec<_> = capture
                .network_bodies(&CaptureFilter::default())
                .items
                .into_iter()
                .map(|c| c.item)
                .collect();
            let proposals = noise.auto_detect(&console, &network, apply);
            let applied = proposals.iter().filter(|p| p.applied).count();
            Ok(json!({
                "proposals": proposals,
                "applied": applied,
                "rule_count": noise.rule_count(),
            }))
        }
        other => Err(ToolError::unknown_mode("noise_action", other, &NOISE_ACTIONS)),
    }
}

fn set_override(daemon: &Daemon, args: Args<'_>) -> ToolResult<Value> {
    let key = args.required_str("key")?;
    let value = args
        .raw("value")
        .cloned()
        .ok_or_else(|| ToolError::missing_param("value"))?;
    let previous = daemon
        .capture()
        .set_override(key, value.clone())
        .map_err(|err| match err {
            CaptureError::TooManyOverrides { .. } => ToolError::invalid_param("key", err.to_string()),
            other => ToolError::internal(other.to_string()),
        })?;
    Ok(json!({ "key": key, "value": value, "previous": previous }))
}
