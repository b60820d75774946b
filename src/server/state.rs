use std::sync::Arc;

use gasoline_mcp::McpServer;

use crate::daemon::Daemon;

#[derive(Clone)]
pub struct AppState {
    pub(crate) daemon: Arc<Daemon>,
    pub(crate) mcp: Arc<McpServer>,
}

impl AppState {
    pub fn new(daemon: Arc<Daemon>, mcp: Arc<McpServer>) -> Self {
        Self { daemon, mcp }
    }

    pub fn daemon(&self) -> &Arc<Daemon> {
        &self.daemon
    }
}
