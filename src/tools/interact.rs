//! `interact`: browser automation executed by the extension.

use std::path::Path;

use gasoline_core_types::{ToolError, ToolResult};
use gasoline_mcp::ToolCall;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use super::args::Args;
use super::commands::{queue_command, CONTROL_KEYS};
use crate::daemon::Daemon;

pub(crate) const ACTIONS: [&str; 6] = ["click", "type", "navigate", "refresh", "execute_js", "upload"];

pub(crate) async fn run(daemon: &Daemon, call: &ToolCall, args: Args<'_>) -> ToolResult<Value> {
    let action = args.mode("action", &ACTIONS)?;
    if !daemon.capture().pilot_enabled() {
        return Err(ToolError::disabled_feature("interact", "ai_web_pilot")
            .with_param("ai_web_pilot"));
    }
    let kind = match action {
        "click" => {
            args.required_str("selector")?;
            "dom_action"
        }
        "type" => {
            args.required_str("selector")?;
            args.required_str("text")?;
            "dom_action"
        }
        "navigate" => {
            let raw = args.required_str("url")?;
            let url = Url::parse(raw)
                .map_err(|err| ToolError::invalid_param("url", format!("invalid URL '{raw}': {err}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ToolError::invalid_param("url", "only http and https URLs can be opened"));
            }
            "browser_action"
        }
        "refresh" => "browser_action",
        "execute_js" => {
            args.required_str("script")?;
            "execute"
        }
        "upload" => {
            check_upload(daemon, args).await?;
            "upload"
        }
        other => return Err(ToolError::unknown_mode("action", other, &ACTIONS)),
    };
    let mut params = args.without(&CONTROL_KEYS);
    params["action"] = json!(action);
    debug!(action, kind, "interact command prepared");
    queue_command(daemon, call, args, kind, params).await
}

async fn check_upload(daemon: &Daemon, args: Args<'_>) -> ToolResult<()> {
    if !daemon.config().server.enable_upload_automation {
        return Err(ToolError::disabled_feature("upload", "--enable-upload-automation"));
    }
    args.required_str("selector")?;
    let file_path = args.required_str("file_path")?;
    if !Path::new(file_path).is_absolute() {
        return Err(ToolError::invalid_param("file_path", "file_path must be absolute"));
    }
    match tokio::fs::metadata(file_path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(ToolError::invalid_param("file_path", format!("'{file_path}' is not a file"))),
        Err(err) => {
            return Err(ToolError::invalid_param(
                "file_path",
                format!("cannot read '{file_path}': {err}"),
            ))
        }
    }
    if let Some(submit_url) = args.str("submit_url")? {
        daemon.ssrf().check("submit_url", submit_url).await?;
    }
    Ok(())
}
