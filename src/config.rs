//! Daemon configuration.
//!
//! Loaded from YAML, then overridden by command-line flags. Every section falls back to the
//! defaults of the component it configures, so an empty file is a valid configuration.

use std::path::PathBuf;

use gasoline_api_contract::ApiContractCfg;
use gasoline_capture_store::CaptureCfg;
use gasoline_log_store::LogStoreCfg;
use gasoline_pending_queries::QueriesCfg;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HTTP_PORT: u16 = 7890;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureCfg,
    pub log_store: LogStoreCfg,
    pub queries: QueriesCfg,
    pub api_contract: ApiContractCfg,
    pub server: ServerCfg,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerCfg {
    /// `0` disables the HTTP listener.
    pub http_port: u16,
    pub enable_upload_automation: bool,
    /// Hosts exempt from the private-address check.
    pub ssrf_allow_hosts: Vec<String>,
    /// Request body limit for JSON ingest routes, in bytes.
    pub max_body_bytes: usize,
    /// Upload limit for `/recordings/save`, in bytes.
    pub max_recording_bytes: usize,
    /// Longest `wait_ms` honoured by `/queries/poll`.
    pub max_poll_wait_ms: u64,
}

impl Default for ServerCfg {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            enable_upload_automation: false,
            ssrf_allow_hosts: Vec::new(),
            max_body_bytes: 10 * 1024 * 1024,
            max_recording_bytes: 1024 * 1024 * 1024,
            max_poll_wait_ms: 30_000,
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_file: Option<PathBuf>,
    pub max_entries: Option<usize>,
    pub http_port: Option<u16>,
    pub enable_upload_automation: bool,
    pub ssrf_allow_hosts: Vec<String>,
}

impl Config {
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(path) = overrides.log_file {
            self.log_store.path = Some(path);
        }
        if let Some(max) = overrides.max_entries {
            self.log_store.max_entries = max;
        }
        if let Some(port) = overrides.http_port {
            self.server.http_port = port;
        }
        if overrides.enable_upload_automation {
            self.server.enable_upload_automation = true;
        }
        for host in overrides.ssrf_allow_hosts {
            let host = host.trim().to_ascii_lowercase();
            if !host.is_empty() && !self.server.ssrf_allow_hosts.contains(&host) {
                self.server.ssrf_allow_hosts.push(host);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_yaml_keeps_section_defaults() {
        let cfg: Config = serde_yaml::from_str(
            "capture:\n  network_bodies: 50\nserver:\n  http_port: 0\n",
        )
        .expect("yaml");
        assert_eq!(cfg.capture.network_bodies, 50);
        assert_eq!(cfg.capture.waterfall, CaptureCfg::default().waterfall);
        assert_eq!(cfg.server.http_port, 0);
        assert_eq!(cfg.queries, QueriesCfg::default());
        assert_eq!(cfg.log_store.max_entries, 10_000);
    }

    #[test]
    fn overrides_win_and_dedupe_hosts() {
        let mut cfg: Config =
            serde_yaml::from_str("server:\n  ssrf_allow_hosts: [staging.internal]\n").expect("yaml");
        cfg.apply_overrides(ConfigOverrides {
            max_entries: Some(500),
            http_port: Some(9000),
            enable_upload_automation: true,
            ssrf_allow_hosts: vec!["Staging.Internal".into(), "dev.local".into()],
            ..Default::default()
        });
        assert_eq!(cfg.log_store.max_entries, 500);
        assert_eq!(cfg.server.http_port, 9000);
        assert!(cfg.server.enable_upload_automation);
        assert_eq!(cfg.server.ssrf_allow_hosts, vec!["staging.internal", "dev.local"]);
    }
}
