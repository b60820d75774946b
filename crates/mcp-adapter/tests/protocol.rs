use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use gasoline_core_types::ToolError;
use gasoline_mcp::{
    AdapterError, AdapterResult, McpServer, ServerInfo, ToolCall, ToolDescriptor, ToolDispatcher,
    ToolOutcome,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

struct EchoDispatcher;

#[async_trait]
impl ToolDispatcher for EchoDispatcher {
    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![ToolDescriptor {
            name: "echo".into(),
            description: "Returns its arguments".into(),
            input_schema: json!({"type": "object"}),
        }]
    }

    async fn call(&self, call: ToolCall) -> AdapterResult<ToolOutcome> {
        match call.name.as_str() {
            "echo" => Ok(ToolOutcome::json(&json!({
                "client": call.client_id,
                "arguments": call.arguments,
            }))
            .with_warnings(vec!["echo warning".into()])),
            "broken" => Ok(ToolOutcome::failure(&ToolError::internal("boom"))),
            other => Err(AdapterError::UnknownTool(other.to_string())),
        }
    }
}

fn server() -> Arc<McpServer> {
    Arc::new(McpServer::new(
        ServerInfo::new("gasoline", "0.1.0"),
        Arc::new(EchoDispatcher),
    ))
}

async fn call(raw: &str) -> Value {
    let resp = server()
        .handle_line(raw, "default")
        .await
        .expect("response expected");
    serde_json::to_value(resp).unwrap()
}

#[tokio::test]
async fn initialize_negotiates_protocol() {
    let resp = call(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#).await;
    assert_eq!(resp["result"]["protocolVersion"], json!("2024-11-05"));
    assert_eq!(resp["result"]["serverInfo"]["name"], json!("gasoline"));

    let resp = call(r#"{"jsonrpc":"2.0","id":2,"method":"initialize","params":{"protocolVersion":"1999-01-01"}}"#).await;
    assert_eq!(resp["result"]["protocolVersion"], json!("2025-06-18"));
}

#[tokio::test]
async fn notifications_get_no_reply() {
    let server = server();
    assert!(server
        .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, "default")
        .await
        .is_none());
}

#[tokio::test]
async fn error_codes_follow_jsonrpc() {
    assert_eq!(call("{not json").await["error"]["code"], json!(-32700));
    assert_eq!(call("[1,2]").await["error"]["code"], json!(-32600));
    assert_eq!(
        call(r#"{"jsonrpc":"1.0","id":3,"method":"ping"}"#).await["error"]["code"],
        json!(-32600)
    );
    let unknown = call(r#"{"jsonrpc":"2.0","id":4,"method":"resources/nope"}"#).await;
    assert_eq!(unknown["error"]["code"], json!(-32601));
    assert_eq!(unknown["id"], json!(4));
    assert_eq!(
        call(r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{}}"#).await["error"]["code"],
        json!(-32602)
    );
    assert_eq!(
        call(r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"missing"}}"#).await["error"]["code"],
        json!(-32601)
    );
}

#[tokio::test]
async fn tools_call_wraps_outcome() {
    let resp = call(r#"{"jsonrpc":"2.0","id":"a","method":"tools/call","params":{"name":"echo","arguments":{"x":1}}}"#).await;
    let result = &resp["result"];
    assert_eq!(result["isError"], json!(false));
    assert_eq!(result["warnings"], json!(["echo warning"]));
    let text: Value = serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(text, json!({"client": "default", "arguments": {"x": 1}}));

    let failed = call(r#"{"jsonrpc":"2.0","id":"b","method":"tools/call","params":{"name":"broken"}}"#).await;
    assert_eq!(failed["result"]["isError"], json!(true));
    assert!(failed.get("error").is_none());
}

#[tokio::test]
async fn tools_list_and_ping() {
    let list = call(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).await;
    assert_eq!(list["result"]["tools"][0]["name"], json!("echo"));
    assert_eq!(list["result"]["tools"][0]["inputSchema"], json!({"type": "object"}));
    let ping = call(r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#).await;
    assert_eq!(ping["result"], json!({}));
}

#[tokio::test]
async fn http_route_uses_client_header() {
    let router = gasoline_mcp::http::router(server());
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/mcp")
                .header("content-type", "application/json")
                .header("x-gasoline-client", "cursor")
                .body(Body::from(
                    r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"echo"}}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap();
    let text: Value =
        serde_json::from_str(value["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(text["client"], json!("cursor"));

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/mcp")
                .body(Body::from(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn stdio_answers_one_line_per_request() {
    let (mut client, server_side) = tokio::io::duplex(64 * 1024);
    let (out_reader, out_writer) = tokio::io::duplex(64 * 1024);
    let (server_read, _server_write) = tokio::io::split(server_side);

    let task = tokio::spawn(gasoline_mcp::stdio::serve_lines(
        server(),
        BufReader::new(server_read),
        out_writer,
        "stdio",
        CancellationToken::new(),
    ));

    client
        .write_all(
            concat!(
                "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n",
                "\n",
                "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
                "{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/list\"}\n",
            )
            .as_bytes(),
        )
        .await
        .unwrap();
    client.shutdown().await.unwrap();
    drop(client);

    let handled = task.await.unwrap().unwrap();
    assert_eq!(handled, 3);

    let mut lines = BufReader::new(out_reader).lines();
    let mut ids = Vec::new();
    while let Some(line) = lines.next_line().await.unwrap() {
        let value: Value = serde_json::from_str(&line).unwrap();
        ids.push(value["id"].clone());
    }
    ids.sort_by_key(|id| id.as_i64());
    assert_eq!(ids, vec![json!(1), json!(2)]);
}
