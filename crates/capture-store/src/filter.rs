use gasoline_core_types::{
    Direction, EnhancedAction, ExtensionLog, NetworkBody, PerformanceSnapshot, SecurityFlag, TabId,
    WaterfallEntry, WebSocketEvent, WebSocketStatus,
};
use gasoline_ring::{Cursor, PageRequest};

/// Read filter shared by every stream. Keys a stream does not carry are ignored for it.
#[derive(Clone, Debug, Default)]
pub struct CaptureFilter {
    pub after: Option<Cursor>,
    pub limit: usize,
    pub restart_on_eviction: bool,
    /// Case-sensitive substring.
    pub url: Option<String>,
    /// Case-insensitive exact match.
    pub method: Option<String>,
    pub status_min: Option<u16>,
    pub status_max: Option<u16>,
    /// Case-insensitive substring.
    pub content_type: Option<String>,
    /// `0` matches every tab.
    pub tab_id: Option<TabId>,
    pub connection_id: Option<String>,
    pub direction: Option<Direction>,
    pub action_type: Option<String>,
    pub level: Option<String>,
}

impl CaptureFilter {
    pub fn page_request(&self) -> PageRequest {
        PageRequest {
            after: self.after,
            since: None,
            limit: self.limit,
            restart_on_eviction: self.restart_on_eviction,
        }
    }

    fn url_ok(&self, url: &str) -> bool {
        self.url.as_deref().map_or(true, |needle| url.contains(needle))
    }

    fn method_ok(&self, method: &str) -> bool {
        self.method
            .as_deref()
            .map_or(true, |m| m.eq_ignore_ascii_case(method))
    }

    fn status_ok(&self, status: Option<u16>) -> bool {
        if self.status_min.is_none() && self.status_max.is_none() {
            return true;
        }
        let Some(status) = status else {
            return false;
        };
        self.status_min.map_or(true, |min| status >= min)
            && self.status_max.map_or(true, |max| status <= max)
    }

    fn tab_ok(&self, tab: Option<TabId>) -> bool {
        match self.tab_id {
            None | Some(0) => true,
            Some(want) => tab == Some(want),
        }
    }
}

/// Per-stream predicate over a [`CaptureFilter`].
pub trait Filterable {
    fn matches(&self, filter: &CaptureFilter) -> bool;
}

impl Filterable for WaterfallEntry {
    fn matches(&self, f: &CaptureFilter) -> bool {
        f.url_ok(&self.url) && f.method_ok(&self.method) && f.status_ok(self.status)
    }
}

impl Filterable for NetworkBody {
    fn matches(&self, f: &CaptureFilter) -> bool {
        let content_ok = f.content_type.as_deref().map_or(true, |ct| {
            self.content_type
                .to_ascii_lowercase()
                .contains(&ct.to_ascii_lowercase())
        });
        f.url_ok(&self.url)
            && f.method_ok(&self.method)
            && f.status_ok(Some(self.status))
            && content_ok
            && f.tab_ok(self.tab_id)
    }
}

impl Filterable for WebSocketEvent {
    fn matches(&self, f: &CaptureFilter) -> bool {
        f.url_ok(&self.url)
            && f.connection_id.as_deref().map_or(true, |id| id == self.id)
            && f.direction.map_or(true, |d| self.direction == Some(d))
            && f.tab_ok(self.tab_id)
    }
}

impl Filterable for WebSocketStatus {
    fn matches(&self, f: &CaptureFilter) -> bool {
        f.url_ok(&self.url)
            && f.connection_id.as_deref().map_or(true, |id| id == self.id)
            && f.tab_ok(self.tab_id)
    }
}

impl Filterable for EnhancedAction {
    fn matches(&self, f: &CaptureFilter) -> bool {
        f.url_ok(&self.url)
            && f.action_type.as_deref().map_or(true, |t| t == self.kind)
            && f.tab_ok(self.tab_id)
    }
}

impl Filterable for PerformanceSnapshot {
    fn matches(&self, f: &CaptureFilter) -> bool {
        f.url_ok(&self.url)
    }
}

impl Filterable for ExtensionLog {
    fn matches(&self, f: &CaptureFilter) -> bool {
        f.level.as_deref().map_or(true, |l| l == self.level)
    }
}

impl Filterable for SecurityFlag {
    fn matches(&self, f: &CaptureFilter) -> bool {
        f.url_ok(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_filter_combines_keys() {
        let body = NetworkBody {
            url: "https://api.example.com/users".into(),
            method: "POST".into(),
            status: 201,
            content_type: "Application/JSON".into(),
            tab_id: Some(4),
            ..Default::default()
        };
        let filter = CaptureFilter {
            url: Some("/users".into()),
            method: Some("post".into()),
            status_min: Some(200),
            status_max: Some(299),
            content_type: Some("json".into()),
            tab_id: Some(4),
            ..Default::default()
        };
        assert!(body.matches(&filter));
        assert!(!body.matches(&CaptureFilter {
            url: Some("/Users".into()),
            ..Default::default()
        }));
        assert!(!body.matches(&CaptureFilter {
            tab_id: Some(5),
            ..Default::default()
        }));
        assert!(body.matches(&CaptureFilter {
            tab_id: Some(0),
            ..Default::default()
        }));
    }

    #[test]
    fn status_range_excludes_unknown_status() {
        let entry = WaterfallEntry {
            url: "https://x/a.js".into(),
            ..Default::default()
        };
        assert!(entry.matches(&CaptureFilter::default()));
        assert!(!entry.matches(&CaptureFilter {
            status_min: Some(400),
            ..Default::default()
        }));
    }
}
