use std::borrow::Cow;

use tracing::{span, Level, Span};

#[derive(Clone, Default)]
pub struct McpTracer {
    pub transport: Cow<'static, str>,
}

impl McpTracer {
    pub fn new(transport: &'static str) -> Self {
        Self {
            transport: Cow::Borrowed(transport),
        }
    }

    pub fn span(&self, client: &str, method: &str) -> Span {
        span!(
            Level::DEBUG,
            "mcp.request",
            client = client,
            method = method,
            transport = %self.transport
        )
    }
}
