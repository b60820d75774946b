use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use gasoline_core_types::{
    Captured, EnhancedAction, ExtensionLog, LogEntry, NetworkBody, PerformanceSnapshot,
    SecurityFlag, TabId, WaterfallEntry, WebSocketEvent, WebSocketStatus,
};
use gasoline_log_store::{LogPage, LogQuery, LogStore};
use gasoline_ring::{Cursor, RingBuffer};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::binary;
use crate::config::CaptureCfg;
use crate::errors::{CaptureError, CaptureResult};
use crate::filter::{CaptureFilter, Filterable};
use crate::security::scan_network_body;
use crate::session::{SecurityMode, SessionState};
use crate::websocket::{ConnectionTracker, ConnectionsView};

/// One page of a stream read.
#[derive(Clone, Debug, Serialize)]
pub struct CapturePage<T> {
    pub items: Vec<Captured<T>>,
    pub cursor: Cursor,
    pub evicted: u64,
    pub restarted: bool,
    /// Live items in the buffer before filtering.
    pub total: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Buffer {
    Logs,
    Network,
    Websocket,
    Actions,
    Performance,
    ExtensionLogs,
    SecurityFlags,
    All,
}

impl Buffer {
    pub const NAMES: [&'static str; 8] = [
        "logs",
        "network",
        "websocket",
        "actions",
        "performance",
        "extension_logs",
        "security_flags",
        "all",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Buffer::Logs => "logs",
            Buffer::Network => "network",
            Buffer::Websocket => "websocket",
            Buffer::Actions => "actions",
            Buffer::Performance => "performance",
            Buffer::ExtensionLogs => "extension_logs",
            Buffer::SecurityFlags => "security_flags",
            Buffer::All => "all",
        }
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Buffer {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "logs" | "console" => Buffer::Logs,
            "network" => Buffer::Network,
            "websocket" => Buffer::Websocket,
            "actions" => Buffer::Actions,
            "performance" => Buffer::Performance,
            "extension_logs" => Buffer::ExtensionLogs,
            "security_flags" => Buffer::SecurityFlags,
            "all" => Buffer::All,
            other => return Err(CaptureError::UnknownBuffer(other.to_string())),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub len: usize,
    pub capacity: usize,
    pub written: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CaptureStats {
    pub streams: BTreeMap<&'static str, StreamStats>,
    pub websocket_active_connections: usize,
}

/// All telemetry rings plus session state. Every ring has its own lock.
pub struct CaptureStore {
    cfg: CaptureCfg,
    logs: Arc<LogStore>,
    waterfall: RwLock<RingBuffer<WaterfallEntry>>,
    bodies: RwLock<RingBuffer<NetworkBody>>,
    ws_events: RwLock<RingBuffer<WebSocketEvent>>,
    ws_status: RwLock<RingBuffer<WebSocketStatus>>,
    actions: RwLock<RingBuffer<EnhancedAction>>,
    performance: RwLock<RingBuffer<PerformanceSnapshot>>,
    extension_logs: RwLock<RingBuffer<ExtensionLog>>,
    security_flags: RwLock<RingBuffer<SecurityFlag>>,
    connections: RwLock<ConnectionTracker>,
    session: RwLock<SessionState>,
}

impl CaptureStore {
    pub fn new(cfg: CaptureCfg, logs: Arc<LogStore>) -> Self {
        Self {
            waterfall: RwLock::new(RingBuffer::new(cfg.waterfall)),
            bodies: RwLock::new(RingBuffer::new(cfg.network_bodies)),
            ws_events: RwLock::new(RingBuffer::new(cfg.websocket_events)),
            ws_status: RwLock::new(RingBuffer::new(cfg.websocket_status)),
            actions: RwLock::new(RingBuffer::new(cfg.actions)),
            performance: RwLock::new(RingBuffer::new(cfg.performance)),
            extension_logs: RwLock::new(RingBuffer::new(cfg.extension_logs)),
            security_flags: RwLock::new(RingBuffer::new(cfg.security_flags)),
            connections: RwLock::new(ConnectionTracker::default()),
            session: RwLock::new(SessionState::default()),
            logs,
            cfg,
        }
    }

    pub fn config(&self) -> &CaptureCfg {
        &self.cfg
    }

    pub fn log_store(&self) -> &Arc<LogStore> {
        &self.logs
    }

    pub fn add_console_logs(&self, entries: Vec<LogEntry>) -> CaptureResult<usize> {
        Ok(self.logs.add_entries(entries)?)
    }

    /// Stores resource timings, filling in `page_url` and remembering the origins the page used.
    pub fn add_waterfall_entries(&self, page_url: &str, mut entries: Vec<WaterfallEntry>) -> usize {
        let mut origins = BTreeSet::new();
        for entry in &mut entries {
            if entry.page_url.is_empty() {
                entry.page_url = page_url.to_string();
            }
            if let Some(origin) = origin_of(&entry.url) {
                origins.insert(origin);
            }
        }
        let count = entries.len();
        self.waterfall.write().write(entries);
        if !page_url.is_empty() {
            let max = self.cfg.max_page_origins;
            let mut session = self.session.write();
            session.record_page_origins(page_url, origins, max);
            session.last_extension_contact = Some(Utc::now());
        }
        count
    }

    /// Caps body strings, tags binary payloads and raises security flags. Returns the bodies as
    /// stored so downstream analysers see the same data.
    pub fn add_network_bodies(&self, bodies: Vec<NetworkBody>) -> Vec<NetworkBody> {
        let page_url = self.session.read().page_url.clone();
        let cap = self.cfg.body_cap_bytes;
        let mut flags = Vec::new();
        let bodies: Vec<NetworkBody> = bodies
            .into_iter()
            .map(|mut body| {
                if truncate_utf8(&mut body.request_body, cap) {
                    body.request_truncated = true;
                }
                if truncate_utf8(&mut body.response_body, cap) {
                    body.response_truncated = true;
                }
                if body.binary_format.is_none() {
                    if let Some(format) = binary::detect(body.response_body.as_bytes()) {
                        body.binary_format = Some(format.name.to_string());
                        body.format_confidence = Some(format.confidence);
                    }
                }
                flags.extend(scan_network_body(&body, page_url.as_deref()));
                body
            })
            .collect();
        self.bodies.write().write(bodies.iter().cloned());
        if !flags.is_empty() {
            debug!(count = flags.len(), "security flags raised from network bodies");
            self.security_flags.write().write(flags);
        }
        bodies
    }

    pub fn add_websocket_events(&self, events: Vec<WebSocketEvent>) -> usize {
        let cap = self.cfg.ws_data_cap_bytes;
        let events: Vec<WebSocketEvent> = events
            .into_iter()
            .map(|mut event| {
                if let Some(data) = event.data.as_mut() {
                    if event.size.is_none() {
                        event.size = Some(data.len() as u64);
                    }
                    if event.binary_format.is_none() {
                        if let Some(format) = binary::detect(data.as_bytes()) {
                            event.binary_format = Some(format.name.to_string());
                            event.format_confidence = Some(format.confidence);
                        }
                    }
                    truncate_utf8(data, cap);
                }
                event
            })
            .collect();
        let count = events.len();
        let now = Utc::now();
        {
            let mut tracker = self.connections.write();
            for event in &events {
                tracker.observe(event, now);
            }
        }
        self.ws_events.write().write(events);
        count
    }

    pub fn add_websocket_status(&self, updates: Vec<WebSocketStatus>) -> usize {
        let count = updates.len();
        self.ws_status.write().write(updates);
        count
    }

    pub fn record_actions(&self, actions: Vec<EnhancedAction>) -> usize {
        let count = actions.len();
        self.actions.write().write(actions);
        count
    }

    pub fn add_performance_snapshots(&self, snapshots: Vec<PerformanceSnapshot>) -> usize {
        let count = snapshots.len();
        self.performance.write().write(snapshots);
        count
    }

    pub fn add_extension_logs(&self, logs: Vec<ExtensionLog>) -> usize {
        let count = logs.len();
        self.extension_logs.write().write(logs);
        count
    }

    pub fn add_security_flags(&self, flags: Vec<SecurityFlag>) -> usize {
        let count = flags.len();
        self.security_flags.write().write(flags);
        count
    }

    pub fn set_page_url(&self, url: impl Into<String>) {
        let url = url.into();
        self.session.write().page_url = (!url.is_empty()).then_some(url);
    }

    pub fn set_tracked_tab(&self, tab: Option<TabId>) {
        self.session.write().tracked_tab = tab.filter(|t| *t != 0);
    }

    pub fn set_pilot_enabled(&self, enabled: bool) {
        self.session.write().pilot_enabled = enabled;
    }

    pub fn set_security_mode(&self, mode: SecurityMode) {
        self.session.write().security_mode = mode;
    }

    /// `Value::Null` removes the key. Returns the previous value.
    pub fn set_override(&self, key: impl Into<String>, value: Value) -> CaptureResult<Option<Value>> {
        let max = self.cfg.max_overrides;
        self.session.write().set_override(key.into(), value, max)
    }

    pub fn mark_extension_contact(&self) {
        self.session.write().last_extension_contact = Some(Utc::now());
    }

    pub fn console_logs(&self, query: &LogQuery) -> LogPage {
        self.logs.read_page(query)
    }

    pub fn waterfall(&self, filter: &CaptureFilter) -> CapturePage<WaterfallEntry> {
        read_stream(&self.waterfall, filter)
    }

    pub fn network_bodies(&self, filter: &CaptureFilter) -> CapturePage<NetworkBody> {
        read_stream(&self.bodies, filter)
    }

    pub fn websocket_events(&self, filter: &CaptureFilter) -> CapturePage<WebSocketEvent> {
        read_stream(&self.ws_events, filter)
    }

    pub fn websocket_status(&self, filter: &CaptureFilter) -> CapturePage<WebSocketStatus> {
        read_stream(&self.ws_status, filter)
    }

    pub fn actions(&self, filter: &CaptureFilter) -> CapturePage<EnhancedAction> {
        read_stream(&self.actions, filter)
    }

    pub fn performance_snapshots(&self, filter: &CaptureFilter) -> CapturePage<PerformanceSnapshot> {
        read_stream(&self.performance, filter)
    }

    pub fn extension_logs(&self, filter: &CaptureFilter) -> CapturePage<ExtensionLog> {
        read_stream(&self.extension_logs, filter)
    }

    pub fn security_flags(&self, filter: &CaptureFilter) -> CapturePage<SecurityFlag> {
        read_stream(&self.security_flags, filter)
    }

    pub fn websocket_connections(&self, url: Option<&str>, connection_id: Option<&str>) -> ConnectionsView {
        self.connections.read().view(url, connection_id)
    }

    pub fn session(&self) -> SessionState {
        self.session.read().clone()
    }

    pub fn pilot_enabled(&self) -> bool {
        self.session.read().pilot_enabled
    }

    pub fn stats(&self) -> CaptureStats {
        let mut streams = BTreeMap::new();
        streams.insert(
            "logs",
            StreamStats {
                len: self.logs.len(),
                capacity: self.logs.capacity(),
                written: self.logs.position(),
            },
        );
        streams.insert("network_waterfall", stream_stats(&self.waterfall));
        streams.insert("network_bodies", stream_stats(&self.bodies));
        streams.insert("websocket_events", stream_stats(&self.ws_events));
        streams.insert("websocket_status", stream_stats(&self.ws_status));
        streams.insert("actions", stream_stats(&self.actions));
        streams.insert("performance", stream_stats(&self.performance));
        streams.insert("extension_logs", stream_stats(&self.extension_logs));
        streams.insert("security_flags", stream_stats(&self.security_flags));
        CaptureStats {
            streams,
            websocket_active_connections: self.connections.read().active_count(),
        }
    }

    /// Returns the number of items removed.
    pub fn clear(&self, buffer: Buffer) -> usize {
        match buffer {
            Buffer::Logs => self.logs.clear(),
            Buffer::Network => self.waterfall.write().clear() + self.bodies.write().clear(),
            Buffer::Websocket => {
                self.connections.write().clear();
                self.ws_events.write().clear() + self.ws_status.write().clear()
            }
            Buffer::Actions => self.actions.write().clear(),
            Buffer::Performance => self.performance.write().clear(),
            Buffer::ExtensionLogs => self.extension_logs.write().clear(),
            Buffer::SecurityFlags => self.security_flags.write().clear(),
            Buffer::All => self.clear_all(),
        }
    }

    pub fn clear_all(&self) -> usize {
        [
            Buffer::Logs,
            Buffer::Network,
            Buffer::Websocket,
            Buffer::Actions,
            Buffer::Performance,
            Buffer::ExtensionLogs,
            Buffer::SecurityFlags,
        ]
        .into_iter()
        .map(|b| self.clear(b))
        .sum()
    }
}

fn read_stream<T: Clone + Filterable>(ring: &RwLock<RingBuffer<T>>, filter: &CaptureFilter) -> CapturePage<T> {
    let req = filter.page_request();
    let (page, total) = {
        let ring = ring.read();
        (ring.page(&req, |item| item.matches(filter)), ring.len())
    };
    CapturePage {
        items: page
            .items
            .into_iter()
            .map(|e| Captured {
                seq: e.position,
                ingested_at: e.added_at,
                item: e.item,
            })
            .collect(),
        cursor: page.cursor,
        evicted: page.evicted,
        restarted: page.restarted,
        total,
    }
}

fn stream_stats<T: Clone>(ring: &RwLock<RingBuffer<T>>) -> StreamStats {
    let ring = ring.read();
    StreamStats {
        len: ring.len(),
        capacity: ring.capacity(),
        written: ring.position(),
    }
}

/// `scheme://host[:port]` for hierarchical URLs.
pub fn origin_of(raw: &str) -> Option<String> {
    let origin = Url::parse(raw).ok()?.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Cuts `s` to at most `max` bytes on a char boundary. Returns whether anything was removed.
pub fn truncate_utf8(s: &mut String, max: usize) -> bool {
    if s.len() <= max {
        return false;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
    true
}
