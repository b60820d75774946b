use serde::{Deserialize, Serialize};

/// Ring capacities and ingest caps for every telemetry stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureCfg {
    pub waterfall: usize,
    pub network_bodies: usize,
    pub websocket_events: usize,
    pub websocket_status: usize,
    pub actions: usize,
    pub performance: usize,
    pub extension_logs: usize,
    pub security_flags: usize,
    /// Per body string, in bytes.
    pub body_cap_bytes: usize,
    /// Per WebSocket message payload, in bytes.
    pub ws_data_cap_bytes: usize,
    pub max_overrides: usize,
    pub max_page_origins: usize,
}

impl Default for CaptureCfg {
    fn default() -> Self {
        Self {
            waterfall: 2_000,
            network_bodies: 500,
            websocket_events: 5_000,
            websocket_status: 1_000,
            actions: 5_000,
            performance: 200,
            extension_logs: 2_000,
            security_flags: 1_000,
            body_cap_bytes: 64 * 1024,
            ws_data_cap_bytes: 4 * 1024,
            max_overrides: 32,
            max_page_origins: 50,
        }
    }
}
