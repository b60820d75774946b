use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use gasoline_core_types::{Direction, WebSocketEvent, WsEventKind};
use serde::Serialize;

pub const MAX_ACTIVE_CONNECTIONS: usize = 20;
pub const MAX_CLOSED_CONNECTIONS: usize = 10;
const RATE_WINDOW_SECS: i64 = 5;
const PREVIEW_CHARS: usize = 200;

#[derive(Clone, Debug, Default)]
struct DirectionState {
    total: u64,
    bytes: u64,
    last_at: Option<DateTime<Utc>>,
    last_data: Option<String>,
    recent: VecDeque<DateTime<Utc>>,
}

impl DirectionState {
    fn record(&mut self, event: &WebSocketEvent, at: DateTime<Utc>) {
        self.total += 1;
        self.bytes += event
            .size
            .unwrap_or_else(|| event.data.as_ref().map_or(0, |d| d.len() as u64));
        self.last_at = Some(at);
        if let Some(data) = &event.data {
            self.last_data = Some(data.chars().take(PREVIEW_CHARS).collect());
        }
        let cutoff = at - Duration::seconds(RATE_WINDOW_SECS);
        while self.recent.front().map_or(false, |t| *t < cutoff) {
            self.recent.pop_front();
        }
        self.recent.push_back(at);
    }

    fn stats(&self, now: DateTime<Utc>) -> DirectionStats {
        let cutoff = now - Duration::seconds(RATE_WINDOW_SECS);
        let in_window = self.recent.iter().filter(|t| **t > cutoff).count();
        DirectionStats {
            per_second: in_window as f64 / RATE_WINDOW_SECS as f64,
            total: self.total,
            bytes: self.bytes,
            last_at: self.last_at,
            last_preview: self.last_data.clone(),
        }
    }
}

#[derive(Clone, Debug)]
struct ConnectionState {
    id: String,
    url: String,
    state: &'static str,
    opened_at: DateTime<Utc>,
    incoming: DirectionState,
    outgoing: DirectionState,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DirectionStats {
    pub per_second: f64,
    pub total: u64,
    pub bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_preview: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActiveConnection {
    pub id: String,
    pub url: String,
    pub state: &'static str,
    pub opened_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub incoming: DirectionStats,
    pub outgoing: DirectionStats,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClosedConnection {
    pub id: String,
    pub url: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,
    pub incoming_total: u64,
    pub outgoing_total: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ConnectionsView {
    pub active: Vec<ActiveConnection>,
    pub closed: Vec<ClosedConnection>,
}

/// Live view of WebSocket connections derived from the event stream.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    active: HashMap<String, ConnectionState>,
    order: VecDeque<String>,
    closed: VecDeque<ClosedConnection>,
}

impl ConnectionTracker {
    pub fn observe(&mut self, event: &WebSocketEvent, at: DateTime<Utc>) {
        match event.event {
            WsEventKind::Open => self.open(event, at),
            WsEventKind::Close => self.close(event, at),
            WsEventKind::Error => {
                if let Some(conn) = self.active.get_mut(&event.id) {
                    conn.state = "error";
                }
            }
            WsEventKind::Message => {
                if let Some(conn) = self.active.get_mut(&event.id) {
                    match event.direction {
                        Some(Direction::Incoming) => conn.incoming.record(event, at),
                        Some(Direction::Outgoing) => conn.outgoing.record(event, at),
                        None => {}
                    }
                }
            }
            WsEventKind::Other => {}
        }
    }

    fn open(&mut self, event: &WebSocketEvent, at: DateTime<Utc>) {
        if self.active.contains_key(&event.id) {
            self.order.retain(|id| id != &event.id);
        } else if self.active.len() >= MAX_ACTIVE_CONNECTIONS {
            if let Some(oldest) = self.order.pop_front() {
                self.active.remove(&oldest);
            }
        }
        self.active.insert(
            event.id.clone(),
            ConnectionState {
                id: event.id.clone(),
                url: event.url.clone(),
                state: "open",
                opened_at: at,
                incoming: DirectionState::default(),
                outgoing: DirectionState::default(),
            },
        );
        self.order.push_back(event.id.clone());
    }

    fn close(&mut self, event: &WebSocketEvent, at: DateTime<Utc>) {
        let Some(conn) = self.active.remove(&event.id) else {
            return;
        };
        self.order.retain(|id| id != &event.id);
        self.closed.push_back(ClosedConnection {
            id: conn.id,
            url: conn.url,
            opened_at: conn.opened_at,
            closed_at: at,
            close_code: event.close_code,
            close_reason: event.close_reason.clone(),
            incoming_total: conn.incoming.total,
            outgoing_total: conn.outgoing.total,
        });
        while self.closed.len() > MAX_CLOSED_CONNECTIONS {
            self.closed.pop_front();
        }
    }

    /// Active connections in open order, then closed ones oldest first.
    pub fn view(&self, url: Option<&str>, connection_id: Option<&str>) -> ConnectionsView {
        let now = Utc::now();
        let keep = |id: &str, conn_url: &str| {
            url.map_or(true, |u| conn_url.contains(u)) && connection_id.map_or(true, |c| c == id)
        };
        let active = self
            .order
            .iter()
            .filter_map(|id| self.active.get(id))
            .filter(|conn| keep(&conn.id, &conn.url))
            .map(|conn| ActiveConnection {
                id: conn.id.clone(),
                url: conn.url.clone(),
                state: conn.state,
                opened_at: conn.opened_at,
                duration_secs: (now - conn.opened_at).num_seconds().max(0),
                incoming: conn.incoming.stats(now),
                outgoing: conn.outgoing.stats(now),
            })
            .collect();
        let closed = self
            .closed
            .iter()
            .filter(|c| keep(&c.id, &c.url))
            .cloned()
            .collect();
        ConnectionsView { active, closed }
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn clear(&mut self) {
        self.active.clear();
        self.order.clear();
        self.closed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, kind: WsEventKind) -> WebSocketEvent {
        WebSocketEvent {
            id: id.into(),
            event: kind,
            url: format!("wss://example.com/{id}"),
            ..Default::default()
        }
    }

    #[test]
    fn tracks_message_totals_per_direction() {
        let mut tracker = ConnectionTracker::default();
        let now = Utc::now();
        tracker.observe(&event("a", WsEventKind::Open), now);
        let mut msg = event("a", WsEventKind::Message);
        msg.direction = Some(Direction::Incoming);
        msg.data = Some("hello".into());
        tracker.observe(&msg, now);
        msg.direction = Some(Direction::Outgoing);
        msg.size = Some(42);
        tracker.observe(&msg, now);

        let view = tracker.view(None, None);
        assert_eq!(view.active.len(), 1);
        assert_eq!(view.active[0].incoming.total, 1);
        assert_eq!(view.active[0].incoming.bytes, 5);
        assert_eq!(view.active[0].outgoing.bytes, 42);
        assert_eq!(view.active[0].incoming.last_preview.as_deref(), Some("hello"));
    }

    #[test]
    fn caps_active_and_closed_connections() {
        let mut tracker = ConnectionTracker::default();
        let now = Utc::now();
        for i in 0..(MAX_ACTIVE_CONNECTIONS + 5) {
            tracker.observe(&event(&format!("c{i}"), WsEventKind::Open), now);
        }
        assert_eq!(tracker.active_count(), MAX_ACTIVE_CONNECTIONS);
        let view = tracker.view(None, Some("c0"));
        assert!(view.active.is_empty());

        for i in 5..(MAX_ACTIVE_CONNECTIONS + 5) {
            tracker.observe(&event(&format!("c{i}"), WsEventKind::Close), now);
        }
        let view = tracker.view(None, None);
        assert!(view.active.is_empty());
        assert_eq!(view.closed.len(), MAX_CLOSED_CONNECTIONS);
        assert_eq!(view.closed.last().map(|c| c.id.as_str()), Some("c24"));
    }

    #[test]
    fn error_marks_connection() {
        let mut tracker = ConnectionTracker::default();
        let now = Utc::now();
        tracker.observe(&event("x", WsEventKind::Open), now);
        tracker.observe(&event("x", WsEventKind::Error), now);
        assert_eq!(tracker.view(None, None).active[0].state, "error");
    }
}
