//! `tools/list` descriptors.

use gasoline_mcp::ToolDescriptor;
use serde_json::{json, Value};

use super::{analyze, configure, generate, interact, observe};

fn descriptor(name: &str, description: &str, input_schema: Value) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

fn paging() -> Value {
    json!({
        "limit": {"type": "integer", "minimum": 1, "maximum": 1000, "description": "Maximum items returned (default 100)"},
        "after_cursor": {"type": "integer", "description": "next_cursor from a previous read"},
        "restart_on_eviction": {"type": "boolean", "description": "Restart from the oldest item when the cursor was evicted"},
        "include_noise": {"type": "boolean", "description": "Keep items matched by noise rules"},
    })
}

fn command_controls() -> Value {
    json!({
        "tab_id": {"type": "integer", "description": "Target tab; defaults to the tracked tab"},
        "wait": {"type": "boolean", "description": "Block until the extension reports the outcome"},
        "timeout_ms": {"type": "integer", "description": "Command deadline (default 30000, max 600000)"},
    })
}

fn merge(mut base: Value, extra: Value) -> Value {
    if let (Some(base), Value::Object(extra)) = (base.as_object_mut(), extra) {
        base.extend(extra);
    }
    base
}

pub(crate) fn descriptors() -> Vec<ToolDescriptor> {
    vec![
        descriptor(
            "observe",
            "Read captured browser telemetry: console logs, network traffic, WebSocket frames, user actions, performance, security flags and command results.",
            json!({
                "type": "object",
                "properties": merge(paging(), json!({
                    "what": {"type": "string", "enum": observe::MODES},
                    "level": {"type": ["string", "array"], "description": "Log level filter"},
                    "contains": {"type": "string"},
                    "url": {"type": "string", "description": "Case-sensitive URL substring"},
                    "method": {"type": "string"},
                    "status_min": {"type": "integer"},
                    "status_max": {"type": "integer"},
                    "content_type": {"type": "string"},
                    "tab_id": {"type": "integer"},
                    "connection_id": {"type": "string"},
                    "direction": {"type": "string", "enum": ["incoming", "outgoing"]},
                    "action_type": {"type": "string"},
                    "max_age_secs": {"type": "integer"},
                    "correlation_id": {"type": "string"},
                })),
                "required": ["what"],
            }),
        ),
        descriptor(
            "analyze",
            "Analyze API contracts and noise, or ask the extension to inspect the DOM or accessibility tree.",
            json!({
                "type": "object",
                "properties": merge(command_controls(), json!({
                    "what": {"type": "string", "enum": analyze::MODES},
                    "operation": {"type": "string", "enum": ["analyze", "report", "clear"]},
                    "url": {"type": "string"},
                    "ignore_endpoints": {"type": "array", "items": {"type": "string"}},
                    "selector": {"type": "string"},
                })),
                "required": ["what"],
            }),
        ),
        descriptor(
            "generate",
            "Generate artifacts from observed traffic, such as a Content-Security-Policy.",
            json!({
                "type": "object",
                "properties": {
                    "format": {"type": "string", "enum": generate::FORMATS},
                    "mode": {"type": "string", "enum": ["strict", "moderate", "report_only"]},
                    "include_report_uri": {"type": "boolean"},
                    "exclude_origins": {"type": "array", "items": {"type": "string"}},
                },
                "required": ["format"],
            }),
        ),
        descriptor(
            "configure",
            "Clear buffers, manage noise rules, set session overrides or report daemon health.",
            json!({
                "type": "object",
                "properties": {
                    "action": {"type": "string", "enum": configure::ACTIONS},
                    "buffer": {"type": "string", "enum": ["logs", "network", "websocket", "actions", "performance", "extension_logs", "security_flags", "all"]},
                    "noise_action": {"type": "string", "enum": configure::NOISE_ACTIONS},
                    "rules": {"type": "array", "items": {"type": "object"}},
                    "rule": {"type": "object"},
                    "rule_id": {"type": "string"},
                    "pattern": {"type": "string"},
                    "category": {"type": "string", "enum": ["console", "network", "websocket"]},
                    "reason": {"type": "string"},
                    "apply": {"type": "boolean"},
                    "key": {"type": "string"},
                    "value": {},
                },
                "required": ["action"],
            }),
        ),
        descriptor(
            "interact",
            "Drive the page through the extension. Requires AI Web Pilot to be enabled in the extension.",
            json!({
                "type": "object",
                "properties": merge(command_controls(), json!({
                    "action": {"type": "string", "enum": interact::ACTIONS},
                    "selector": {"type": "string"},
                    "text": {"type": "string"},
                    "url": {"type": "string"},
                    "script": {"type": "string"},
                    "file_path": {"type": "string"},
                    "submit_url": {"type": "string"},
                })),
                "required": ["action"],
            }),
        ),
    ]
}
