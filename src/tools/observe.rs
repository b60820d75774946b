//! `observe`: read-only views over the capture buffers and the command registry.

use gasoline_capture_store::{CaptureFilter, CapturePage};
use gasoline_core_types::{Captured, Direction, LogLevel, ToolError, ToolResult};
use gasoline_log_store::LogQuery;
use gasoline_mcp::ToolCall;
use gasoline_pending_queries::QuerySnapshot;
use serde::Serialize;
use serde_json::{json, Value};

use super::args::Args;
use super::commands;
use crate::daemon::Daemon;

pub(crate) const MODES: [&str; 13] = [
    "logs",
    "errors",
    "network_waterfall",
    "network_bodies",
    "websocket_events",
    "websocket_status",
    "actions",
    "performance",
    "extension_logs",
    "security_flags",
    "page",
    "pending_commands",
    "command_result",
];

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1_000;

pub(crate) fn run(daemon: &Daemon, call: &ToolCall, args: Args<'_>) -> ToolResult<Value> {
    let what = args.mode("what", &MODES)?;
    let include_noise = args.bool("include_noise")?;
    let capture = daemon.capture();
    let noise = daemon.noise();
    match what {
        "logs" => logs(daemon, args, None),
        "errors" => logs(daemon, args, Some(LogLevel::Error)),
        "network_waterfall" => {
            let page = capture.waterfall(&capture_filter(args)?);
            Ok(page_json("entries", page, include_noise, |e| {
                noise.is_request_noise(&e.method, &e.url, e.status)
            }))
        }
        "network_bodies" => {
            let page = capture.network_bodies(&capture_filter(args)?);
            Ok(page_json("bodies", page, include_noise, |b| noise.is_network_noise(b)))
        }
        "websocket_events" => {
            let page = capture.websocket_events(&capture_filter(args)?);
            Ok(page_json("events", page, include_noise, |e| noise.is_websocket_noise(e)))
        }
        "websocket_status" => {
            let filter = capture_filter(args)?;
            let connections =
                capture.websocket_connections(filter.url.as_deref(), filter.connection_id.as_deref());
            let mut out = page_json("updates", capture.websocket_status(&filter), true, |_| false);
            out["connections"] = json!(connections);
            Ok(out)
        }
        "actions" => Ok(page_json("actions", capture.actions(&capture_filter(args)?), true, |_| false)),
        "performance" => Ok(page_json(
            "snapshots",
            capture.performance_snapshots(&capture_filter(args)?),
            true,
            |_| false,
        )),
        "extension_logs" => Ok(page_json(
            "logs",
            capture.extension_logs(&capture_filter(args)?),
            true,
            |_| false,
        )),
        "security_flags" => Ok(page_json(
            "flags",
            capture.security_flags(&capture_filter(args)?),
            true,
            |_| false,
        )),
        "page" => Ok(json!({
            "session": capture.session(),
            "buffers": capture.stats(),
        })),
        "pending_commands" => Ok(pending_commands(daemon, &call.client_id)),
        "command_result" => {
            let id = args.required_str("correlation_id")?;
            let snapshot = daemon
                .queries()
                .status(id, &call.client_id)
                .map_err(ToolError::from)?;
            commands::describe(snapshot)
        }
        other => Err(ToolError::unknown_mode("what", other, &MODES)),
    }
}

fn limit(args: Args<'_>) -> ToolResult<usize> {
    Ok(args
        .usize("limit")?
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_LIMIT)
        .min(MAX_LIMIT))
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

fn capture_filter(args: Args<'_>) -> ToolResult<CaptureFilter> {
    let direction = match args.str("direction")? {
        None => None,
        Some("incoming") => Some(Direction::Incoming),
        Some("outgoing") => Some(Direction::Outgoing),
        Some(other) => {
            return Err(ToolError::unknown_mode("direction", other, &["incoming", "outgoing"]))
        }
    };
    Ok(CaptureFilter {
        after: args.cursor("after_cursor")?,
        limit: limit(args)?,
        restart_on_eviction: args.bool("restart_on_eviction")?,
        url: owned(args.str("url")?),
        method: owned(args.str("method")?),
        status_min: args.u16("status_min")?,
        status_max: args.u16("status_max")?,
        content_type: owned(args.str("content_type")?),
        tab_id: args.u64("tab_id")?,
        connection_id: owned(args.str("connection_id")?),
        direction,
        action_type: owned(args.str("action_type")?),
        level: owned(args.str("level")?),
    })
}

fn logs(daemon: &Daemon, args: Args<'_>, fixed: Option<LogLevel>) -> ToolResult<Value> {
    let levels = match fixed {
        Some(level) => vec![level],
        None => args
            .strings("level")?
            .iter()
            .map(|raw| {
                LogLevel::parse(raw).ok_or_else(|| {
                    ToolError::invalid_param("level", format!("unknown log level '{raw}'"))
                        .with_valid_values(LogLevel::names())
                })
            })
            .collect::<ToolResult<Vec<_>>>()?,
    };
    let query = LogQuery {
        after: args.cursor("after_cursor")?,
        levels,
        contains: owned(args.str("contains")?),
        url: owned(args.str("url")?),
        tab_id: args.u64("tab_id")?,
        limit: limit(args)?,
        restart_on_eviction: args.bool("restart_on_eviction")?,
        max_age: args
            .u64("max_age_secs")?
            .map(|secs| chrono::Duration::seconds(secs.min(i64::MAX as u64) as i64)),
    };
    let page = daemon.capture().console_logs(&query);
    let noise = daemon.noise();
    let (entries, filtered) = drop_noise(page.entries, args.bool("include_noise")?, |e| {
        noise.is_console_noise(&e.item)
    });
    Ok(json!({
        "entries": entries,
        "count": entries.len(),
        "total": page.total,
        "next_cursor": page.cursor.position,
        "evicted": page.evicted,
        "restarted": page.restarted,
        "noise_filtered": filtered,
    }))
}

fn drop_noise<T>(items: Vec<T>, include_noise: bool, is_noise: impl Fn(&T) -> bool) -> (Vec<T>, usize) {
    if include_noise {
        return (items, 0);
    }
    let before = items.len();
    let kept: Vec<T> = items.into_iter().filter(|item| !is_noise(item)).collect();
    let filtered = before - kept.len();
    (kept, filtered)
}

fn page_json<T: Serialize>(
    key: &str,
    page: CapturePage<T>,
    include_noise: bool,
    is_noise: impl Fn(&T) -> bool,
) -> Value {
    let CapturePage {
        items,
        cursor,
        evicted,
        restarted,
        total,
    } = page;
    let (items, filtered) = drop_noise(items, include_noise, |c: &Captured<T>| is_noise(&c.item));
    let mut out = json!({
        "count": items.len(),
        "total": total,
        "next_cursor": cursor.position,
        "evicted": evicted,
        "restarted": restarted,
        "noise_filtered": filtered,
    });
    out[key] = json!(items);
    out
}

fn pending_commands(daemon: &Daemon, client_id: &str) -> Value {
    let registry = daemon.queries();
    let mine = |s: &QuerySnapshot| s.query.client_id == client_id;
    let completed: Vec<QuerySnapshot> = registry.completed().into_iter().filter(mine).collect();
    let failed: Vec<QuerySnapshot> = registry.failed().into_iter().filter(mine).collect();
    json!({
        "pending": registry.pending(Some(client_id)),
        "completed": completed,
        "failed": failed,
        "queue_depth": registry.queue_depth(),
    })
}
