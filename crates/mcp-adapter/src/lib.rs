//! JSON-RPC 2.0 framing for the Model Context Protocol.
//!
//! [`McpServer`] answers `initialize`, `ping`, `tools/list` and `tools/call`, delegating tool
//! work to a [`ToolDispatcher`]. The same server sits behind both transports: newline-delimited
//! stdio ([`stdio::serve_lines`]) and `POST /mcp` ([`http::router`]).

pub mod errors;
pub mod http;
pub mod jsonrpc;
pub mod ports;
pub mod server;
pub mod stdio;
pub mod trace;

pub use errors::{AdapterError, AdapterResult};
pub use jsonrpc::{JsonRpcRequest, JsonRpcResponse, RpcError};
pub use ports::{
    ContentBlock, NoopDispatcher, ToolCall, ToolDescriptor, ToolDispatcher, ToolOutcome,
    DEFAULT_CLIENT_ID,
};
pub use server::{McpServer, ServerInfo, SUPPORTED_PROTOCOL_VERSIONS};
