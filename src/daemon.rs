//! Component container shared by the HTTP routes and the tool handlers.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use gasoline_api_contract::ApiContractValidator;
use gasoline_capture_store::CaptureStore;
use gasoline_core_types::{NetworkBody, WaterfallEntry, Warnings};
use gasoline_csp::OriginAccumulator;
use gasoline_log_store::LogStore;
use gasoline_noise::NoiseFilter;
use gasoline_pending_queries::QueryRegistry;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::Config;
use crate::recordings::RecordingStore;
use crate::ssrf::SsrfGuard;
use crate::state_dir::StateDir;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct Daemon {
    config: Config,
    state_dir: StateDir,
    warnings: Warnings,
    capture: Arc<CaptureStore>,
    queries: Arc<QueryRegistry>,
    contracts: ApiContractValidator,
    origins: OriginAccumulator,
    noise: NoiseFilter,
    recordings: RecordingStore,
    ssrf: SsrfGuard,
    started_at: DateTime<Utc>,
}

/// What a daemon-wide clear removed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClearSummary {
    pub buffers: usize,
    pub endpoints: usize,
    pub queries: usize,
}

impl Daemon {
    /// Opens the console mirror (reloading it) and wires every component.
    pub fn build(config: Config, state_dir: StateDir, warnings: Warnings) -> anyhow::Result<Self> {
        let logs = LogStore::open(config.log_store.clone(), warnings.clone())
            .context("failed to open console log store")?;
        Ok(Self::assemble(config, state_dir, warnings, logs))
    }

    /// Never mirrors console logs to disk.
    pub fn in_memory(config: Config, state_dir: StateDir) -> Self {
        let warnings = Warnings::new();
        let logs = LogStore::in_memory(config.log_store.clone(), warnings.clone());
        Self::assemble(config, state_dir, warnings, logs)
    }

    fn assemble(config: Config, state_dir: StateDir, warnings: Warnings, logs: LogStore) -> Self {
        let capture = Arc::new(CaptureStore::new(config.capture.clone(), Arc::new(logs)));
        let queries = Arc::new(QueryRegistry::new(config.queries.clone()));
        let contracts = ApiContractValidator::new(config.api_contract.clone());
        let recordings = RecordingStore::new(state_dir.recordings_dir());
        let ssrf = SsrfGuard::new(config.server.ssrf_allow_hosts.iter().cloned());
        info!(
            state_dir = %state_dir.root().display(),
            upload_automation = config.server.enable_upload_automation,
            "daemon components ready"
        );
        Self {
            config,
            state_dir,
            warnings,
            capture,
            queries,
            contracts,
            origins: OriginAccumulator::new(),
            noise: NoiseFilter::new(),
            recordings,
            ssrf,
            started_at: Utc::now(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state_dir(&self) -> &StateDir {
        &self.state_dir
    }

    pub fn warnings(&self) -> &Warnings {
        &self.warnings
    }

    pub fn capture(&self) -> &Arc<CaptureStore> {
        &self.capture
    }

    pub fn queries(&self) -> &Arc<QueryRegistry> {
        &self.queries
    }

    pub fn contracts(&self) -> &ApiContractValidator {
        &self.contracts
    }

    pub fn origins(&self) -> &OriginAccumulator {
        &self.origins
    }

    pub fn noise(&self) -> &NoiseFilter {
        &self.noise
    }

    pub fn recordings(&self) -> &RecordingStore {
        &self.recordings
    }

    pub fn ssrf(&self) -> &SsrfGuard {
        &self.ssrf
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Stores bodies, then feeds the stored copies to the contract validator and the origin
    /// accumulator.
    pub fn ingest_network_bodies(&self, bodies: Vec<NetworkBody>) -> usize {
        let stored = self.capture.add_network_bodies(bodies);
        let page_url = self.capture.session().page_url.unwrap_or_default();
        let mut violations = 0;
        for body in &stored {
            violations += self.contracts.observe(body).len();
            let page = body.page_url.as_deref().unwrap_or(&page_url);
            self.origins.record_from_body(&body.url, &body.content_type, page);
        }
        if violations > 0 {
            debug!(violations, "api contract violations recorded");
        }
        stored.len()
    }

    pub fn ingest_waterfall(&self, page_url: &str, entries: Vec<WaterfallEntry>) -> usize {
        for entry in &entries {
            let page = if entry.page_url.is_empty() {
                page_url
            } else {
                &entry.page_url
            };
            self.origins
                .record_from_waterfall(&entry.url, entry.initiator_type, page);
        }
        self.capture.add_waterfall_entries(page_url, entries)
    }

    /// Clears capture buffers, contract trackers and pending queries. Origins are kept.
    pub fn clear_all(&self) -> ClearSummary {
        let buffers = self.capture.clear_all();
        let endpoints = self.contracts.clear();
        let queries = self.queries.clear();
        info!(buffers, endpoints, queries, "daemon state cleared");
        ClearSummary {
            buffers,
            endpoints,
            queries,
        }
    }

    /// Liveness plus a summary of every component.
    pub fn health(&self) -> Value {
        let session = self.capture.session();
        let uptime = (Utc::now() - self.started_at).num_seconds().max(0);
        json!({
            "status": "ok",
            "version": VERSION,
            "git_hash": env!("GASOLINE_GIT_HASH"),
            "build_date": env!("GASOLINE_BUILD_DATE"),
            "started_at": self.started_at,
            "uptime_secs": uptime,
            "state_dir": self.state_dir.root(),
            "state_dir_fallback": self.state_dir.is_fallback(),
            "buffers": self.capture.stats(),
            "log_store": self.capture.log_store().metrics().snapshot(),
            "log_file": self.capture.log_store().path(),
            "pending_queries": self.queries.queue_depth(),
            "api_endpoints": self.contracts.endpoint_count(),
            "csp_origins": self.origins.len(),
            "noise_rules": self.noise.rule_count(),
            "pilot_enabled": session.pilot_enabled,
            "last_extension_contact": session.last_extension_contact,
        })
    }

    pub fn drain_warnings(&self) -> Vec<String> {
        self.warnings.drain()
    }

    /// Expires open queries and drains the console mirror. Blocks up to the writer timeout.
    pub fn shutdown(&self) {
        let expired = self.queries.expire_all("daemon shutting down");
        if expired > 0 {
            debug!(expired, "open queries expired at shutdown");
        }
        self.capture.log_store().shutdown();
    }
}
