use std::sync::Arc;

use gasoline_capture_store::{Buffer, CaptureCfg, CaptureFilter, CaptureStore, SecurityMode};
use gasoline_core_types::{
    Direction, NetworkBody, WaterfallEntry, Warnings, WebSocketEvent, WsEventKind,
};
use gasoline_log_store::{LogQuery, LogStore, LogStoreCfg};
use gasoline_ring::Cursor;
use pretty_assertions::assert_eq;
use serde_json::json;

fn store_with(cfg: CaptureCfg) -> CaptureStore {
    let logs = Arc::new(LogStore::in_memory(LogStoreCfg::default(), Warnings::new()));
    CaptureStore::new(cfg, logs)
}

fn store() -> CaptureStore {
    store_with(CaptureCfg::default())
}

fn body(url: &str, status: u16) -> NetworkBody {
    NetworkBody {
        url: url.into(),
        method: "GET".into(),
        status,
        content_type: "application/json".into(),
        response_body: "{\"ok\":true}".into(),
        ..Default::default()
    }
}

#[test]
fn cursor_reads_over_network_bodies_are_gap_free() {
    let store = store_with(CaptureCfg {
        network_bodies: 3,
        ..CaptureCfg::default()
    });
    store.add_network_bodies(vec![body("https://a/1", 200), body("https://a/2", 200)]);
    let first = store.network_bodies(&CaptureFilter {
        after: Some(Cursor::start()),
        ..Default::default()
    });
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.cursor.position, 2);

    store.add_network_bodies(vec![
        body("https://a/3", 200),
        body("https://a/4", 200),
        body("https://a/5", 200),
    ]);
    let second = store.network_bodies(&CaptureFilter {
        after: Some(first.cursor),
        ..Default::default()
    });
    let urls: Vec<&str> = second.items.iter().map(|c| c.item.url.as_str()).collect();
    assert_eq!(urls, vec!["https://a/3", "https://a/4", "https://a/5"]);
    assert_eq!(second.evicted, 0);
    assert_eq!(second.items[0].seq, 2);
}

#[test]
fn bodies_are_capped_and_flagged() {
    let store = store_with(CaptureCfg {
        body_cap_bytes: 8,
        ..CaptureCfg::default()
    });
    store.set_page_url("https://app.example.com/");
    let mut b = body("http://api.example.com/data?token=supersecretvalue", 200);
    b.response_body = "0123456789abcdef".into();
    let stored = store.add_network_bodies(vec![b]);
    assert_eq!(stored[0].response_body, "01234567");
    assert!(stored[0].response_truncated);

    let flags = store.security_flags(&CaptureFilter::default());
    let kinds: Vec<&str> = flags.items.iter().map(|f| f.item.kind.as_str()).collect();
    assert_eq!(kinds, vec!["credential_in_url", "mixed_content"]);
}

#[test]
fn binary_bodies_are_tagged() {
    let store = store();
    let mut b = body("https://api.example.com/rpc", 200);
    b.content_type = "application/octet-stream".into();
    b.response_body = String::from_utf8(vec![0x0a, 0x03, 0x01, 0x02, 0x03]).expect("utf8");
    let stored = store.add_network_bodies(vec![b]);
    assert_eq!(stored[0].binary_format.as_deref(), Some("protobuf"));
}

#[test]
fn websocket_events_drive_connection_tracker() {
    let store = store();
    let open = WebSocketEvent {
        id: "ws-1".into(),
        event: WsEventKind::Open,
        url: "wss://live.example.com/feed".into(),
        ..Default::default()
    };
    let message = WebSocketEvent {
        id: "ws-1".into(),
        event: WsEventKind::Message,
        direction: Some(Direction::Incoming),
        data: Some("x".repeat(10_000)),
        url: "wss://live.example.com/feed".into(),
        ..Default::default()
    };
    assert_eq!(store.add_websocket_events(vec![open, message]), 2);

    let events = store.websocket_events(&CaptureFilter {
        direction: Some(Direction::Incoming),
        ..Default::default()
    });
    assert_eq!(events.items.len(), 1);
    let stored = &events.items[0].item;
    assert_eq!(stored.data.as_ref().map(String::len), Some(4 * 1024));
    assert_eq!(stored.size, Some(10_000));

    let view = store.websocket_connections(Some("live"), None);
    assert_eq!(view.active.len(), 1);
    assert_eq!(view.active[0].incoming.total, 1);
}

#[test]
fn waterfall_records_page_origins() {
    let store = store();
    let entries = vec![
        WaterfallEntry {
            url: "https://cdn.example.com/app.js".into(),
            ..Default::default()
        },
        WaterfallEntry {
            url: "https://fonts.example.net/a.woff2".into(),
            ..Default::default()
        },
    ];
    assert_eq!(store.add_waterfall_entries("https://app.example.com/", entries), 2);
    let page = store.waterfall(&CaptureFilter::default());
    assert!(page
        .items
        .iter()
        .all(|c| c.item.page_url == "https://app.example.com/"));
    let session = store.session();
    let origins = &session.page_origins["https://app.example.com/"].origins;
    assert!(origins.contains("https://cdn.example.com"));
    assert!(origins.contains("https://fonts.example.net"));
}

#[test]
fn clear_reports_removed_counts() {
    let store = store();
    store
        .add_console_logs(vec![json!({"level": "error", "message": "x"})
            .as_object()
            .cloned()
            .expect("object")])
        .expect("log");
    store.add_network_bodies(vec![body("https://a/1", 500)]);
    store.add_waterfall_entries(
        "",
        vec![WaterfallEntry {
            url: "https://a/1".into(),
            ..Default::default()
        }],
    );
    assert_eq!(store.clear(Buffer::Network), 2);
    assert_eq!(store.clear(Buffer::All), 1);
    assert!(store.console_logs(&LogQuery::default()).entries.is_empty());
    assert_eq!(store.stats().streams["network_bodies"].written, 1);
}

#[test]
fn session_settings_apply() {
    let store = store();
    store.set_pilot_enabled(true);
    store.set_security_mode(SecurityMode::InsecureProxy);
    store.set_tracked_tab(Some(0));
    store.set_override("theme", json!("dark")).expect("override");
    let session = store.session();
    assert!(session.pilot_enabled);
    assert_eq!(session.security_mode, SecurityMode::InsecureProxy);
    assert_eq!(session.tracked_tab, None);
    assert_eq!(session.overrides["theme"], json!("dark"));
}
