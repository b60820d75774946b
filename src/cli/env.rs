use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::ConfigOverrides;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    pub debug: bool,

    /// Daemon log output format (always written to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Console log mirror (JSON lines)
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Console log entries kept in memory
    #[arg(long, value_name = "N")]
    pub max_entries: Option<usize>,

    /// Extension HTTP port on 127.0.0.1 (0 disables the listener)
    #[arg(long, value_name = "PORT")]
    pub http_port: Option<u16>,

    /// Allow `interact` uploads
    #[arg(long)]
    pub enable_upload_automation: bool,

    /// Host exempt from the private-address check (repeatable)
    #[arg(long = "ssrf-allow-host", value_name = "HOST")]
    pub ssrf_allow_hosts: Vec<String>,

    /// Serve HTTP only; do not read MCP requests from stdin
    #[arg(long)]
    pub no_stdio: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl CliArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            log_file: self.log_file.clone(),
            max_entries: self.max_entries,
            http_port: self.http_port,
            enable_upload_automation: self.enable_upload_automation,
            ssrf_allow_hosts: self.ssrf_allow_hosts.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeatable_allow_hosts_and_port() {
        let args = CliArgs::try_parse_from([
            "gasoline",
            "--http-port",
            "0",
            "--ssrf-allow-host",
            "a.internal",
            "--ssrf-allow-host",
            "b.internal",
            "--log-format",
            "json",
        ])
        .expect("parse");
        let overrides = args.overrides();
        assert_eq!(overrides.http_port, Some(0));
        assert_eq!(overrides.ssrf_allow_hosts, vec!["a.internal", "b.internal"]);
        assert_eq!(args.log_format, LogFormat::Json);
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn rejects_bad_port() {
        let err = CliArgs::try_parse_from(["gasoline", "--http-port", "http"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
