use std::sync::Arc;

use gasoline_core_types::{InitiatorType, NetworkBody, WaterfallEntry};
use gasoline_daemon::config::Config;
use gasoline_daemon::daemon::Daemon;
use gasoline_daemon::state_dir::StateDir;
use gasoline_daemon::tools::GasolineTools;
use gasoline_mcp::{AdapterError, ToolCall, ToolDispatcher, ToolOutcome};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn tools() -> (tempfile::TempDir, Arc<Daemon>, GasolineTools) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let state_dir = StateDir::at(tmp.path()).expect("state dir");
    let daemon = Arc::new(Daemon::in_memory(Config::default(), state_dir));
    let tools = GasolineTools::new(daemon.clone());
    (tmp, daemon, tools)
}

async fn call(tools: &GasolineTools, name: &str, arguments: Value) -> ToolOutcome {
    tools
        .call(ToolCall::new(name, arguments))
        .await
        .expect("known tool")
}

fn json_body(url: &str, body: &str) -> NetworkBody {
    NetworkBody {
        url: url.into(),
        method: "GET".into(),
        status: 200,
        content_type: "application/json".into(),
        response_body: body.into(),
        ..NetworkBody::default()
    }
}

#[tokio::test]
async fn unknown_tool_is_a_framing_error() {
    let (_tmp, _daemon, tools) = tools();
    let err = tools
        .call(ToolCall::new("teleport", json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::UnknownTool(name) if name == "teleport"));
}

#[tokio::test]
async fn unknown_mode_lists_valid_values() {
    let (_tmp, _daemon, tools) = tools();
    let outcome = call(&tools, "observe", json!({ "what": "everything" })).await;
    assert!(outcome.is_error);
    let payload = outcome.payload().expect("payload");
    assert_eq!(payload["code"], json!("unknown_mode"));
    assert_eq!(payload["param"], json!("what"));
    assert!(payload["valid_values"]
        .as_array()
        .expect("valid values")
        .contains(&json!("network_bodies")));
}

#[tokio::test]
async fn observe_network_bodies_filters_and_pages() {
    let (_tmp, daemon, tools) = tools();
    daemon.ingest_network_bodies(vec![
        json_body("https://api.test/users", r#"{"id":1}"#),
        json_body("https://api.test/orders", r#"{"id":2}"#),
        json_body("https://api.test/users/2", r#"{"id":3}"#),
    ]);

    let first = call(
        &tools,
        "observe",
        json!({ "what": "network_bodies", "url": "users", "limit": 1 }),
    )
    .await
    .payload()
    .expect("payload");
    assert_eq!(first["count"], json!(1));
    assert_eq!(first["bodies"][0]["url"], json!("https://api.test/users"));

    let second = call(
        &tools,
        "observe",
        json!({ "what": "network_bodies", "url": "users", "after_cursor": first["next_cursor"] }),
    )
    .await
    .payload()
    .expect("payload");
    assert_eq!(second["count"], json!(1));
    assert_eq!(second["bodies"][0]["url"], json!("https://api.test/users/2"));
}

#[tokio::test]
async fn api_validation_reports_shape_drift() {
    let (_tmp, daemon, tools) = tools();
    daemon.ingest_network_bodies(vec![
        json_body("https://api.test/users/1", r#"{"id":1,"name":"a"}"#),
        json_body("https://api.test/users/2", r#"{"id":"two"}"#),
    ]);
    let outcome = call(&tools, "analyze", json!({ "what": "api_validation" })).await;
    assert!(!outcome.is_error);
    let payload = outcome.payload().expect("payload");
    assert_ne!(payload, Value::Null);

    let cleared = call(
        &tools,
        "analyze",
        json!({ "what": "api_validation", "operation": "clear" }),
    )
    .await;
    assert!(!cleared.is_error);
    assert_eq!(daemon.contracts().endpoint_count(), 0);
}

#[tokio::test]
async fn generate_csp_from_observed_origins() {
    let (_tmp, daemon, tools) = tools();
    daemon.ingest_waterfall(
        "https://app.test/",
        vec![WaterfallEntry {
            url: "https://cdn.test/app.js".into(),
            initiator_type: InitiatorType::Script,
            ..WaterfallEntry::default()
        }],
    );
    let outcome = call(&tools, "generate", json!({ "format": "csp", "mode": "strict" })).await;
    assert!(!outcome.is_error);
    let payload = outcome.payload().expect("payload");
    assert!(payload["csp_header"]
        .as_str()
        .expect("header")
        .starts_with("default-src 'self'"));

    let bad = call(&tools, "generate", json!({ "format": "csp", "mode": "lenient" })).await;
    assert!(bad.is_error);
    assert_eq!(bad.payload().expect("payload")["code"], json!("unknown_mode"));
}

#[tokio::test]
async fn configure_clear_empties_one_buffer() {
    let (_tmp, daemon, tools) = tools();
    daemon.ingest_network_bodies(vec![json_body("https://api.test/a", "{}")]);
    let outcome = call(
        &tools,
        "configure",
        json!({ "action": "clear", "buffer": "network_bodies" }),
    )
    .await;
    let payload = outcome.payload().expect("payload");
    assert_eq!(payload, json!({ "cleared": "network_bodies", "removed": 1 }));
}

#[tokio::test]
async fn noise_rules_hide_matching_console_entries() {
    let (_tmp, daemon, tools) = tools();
    let added = call(
        &tools,
        "configure",
        json!({
            "action": "noise_rule",
            "noise_action": "add",
            "rule": { "category": "console", "match_spec": { "message_regex": "favicon" } },
        }),
    )
    .await;
    assert!(!added.is_error, "{:?}", added.payload());

    let batch: Vec<_> = [("error", "GET /favicon.ico 404"), ("error", "real failure")]
        .iter()
        .map(|(level, message)| {
            json!({ "level": level, "message": message })
                .as_object()
                .cloned()
                .expect("object")
        })
        .collect();
    daemon.capture().add_console_logs(batch).expect("stored");

    let quiet = call(&tools, "observe", json!({ "what": "errors" }))
        .await
        .payload()
        .expect("payload");
    assert_eq!(quiet["count"], json!(1));
    assert_eq!(quiet["noise_filtered"], json!(1));

    let loud = call(&tools, "observe", json!({ "what": "errors", "include_noise": true }))
        .await
        .payload()
        .expect("payload");
    assert_eq!(loud["count"], json!(2));
}

#[tokio::test]
async fn upload_requires_the_automation_flag() {
    let (_tmp, daemon, tools) = tools();
    daemon.capture().set_pilot_enabled(true);
    let outcome = call(
        &tools,
        "interact",
        json!({ "action": "upload", "selector": "input[type=file]", "file_path": "/tmp/a.png" }),
    )
    .await;
    assert!(outcome.is_error);
    assert_eq!(outcome.payload().expect("payload")["code"], json!("disabled_feature"));
}

#[tokio::test]
async fn waited_command_expires_at_its_deadline() {
    let (_tmp, daemon, tools) = tools();
    daemon.capture().set_pilot_enabled(true);
    let outcome = call(
        &tools,
        "interact",
        json!({ "action": "refresh", "wait": true, "timeout_ms": 50 }),
    )
    .await;
    assert!(outcome.is_error);
    let payload = outcome.payload().expect("payload");
    assert_eq!(payload["code"], json!("expired"));
    assert_eq!(payload["param"], json!("correlation_id"));
    assert_eq!(daemon.queries().queue_depth(), 0);
}
