use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use gasoline_core_types::InitiatorType;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::trace;

use crate::policy::{build_policy, CspParams, CspResponse};
use crate::resource::{origin_of, resource_type_for_content_type, resource_type_for_initiator};

/// Page URLs remembered per entry and globally.
pub const MAX_PAGES: usize = 1_000;

/// Observations of one `(origin, resource_type)` pair.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OriginEntry {
    pub origin: String,
    pub resource_type: String,
    #[serde(skip)]
    pub pages: BTreeSet<String>,
    #[serde(rename = "observation_count")]
    pub count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Default)]
pub(crate) struct AccumulatorState {
    pub(crate) entries: BTreeMap<(String, String), OriginEntry>,
    pub(crate) pages: BTreeSet<String>,
}

/// Append-only record of where the page loads resources from. Entries are never evicted.
#[derive(Default)]
pub struct OriginAccumulator {
    state: RwLock<AccumulatorState>,
}

impl OriginAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_origin(&self, origin: &str, resource_type: &str, page_url: &str) {
        self.record_origin_at(origin, resource_type, page_url, Utc::now());
    }

    pub fn record_origin_at(
        &self,
        origin: &str,
        resource_type: &str,
        page_url: &str,
        now: DateTime<Utc>,
    ) {
        let mut state = self.state.write();
        let entry = state
            .entries
            .entry((origin.to_string(), resource_type.to_string()))
            .or_insert_with(|| OriginEntry {
                origin: origin.to_string(),
                resource_type: resource_type.to_string(),
                pages: BTreeSet::new(),
                count: 0,
                first_seen: now,
                last_seen: now,
            });
        entry.count += 1;
        entry.last_seen = now;
        if !page_url.is_empty() {
            if entry.pages.len() < MAX_PAGES {
                entry.pages.insert(page_url.to_string());
            }
            if state.pages.len() < MAX_PAGES {
                state.pages.insert(page_url.to_string());
            }
        }
    }

    /// Records the origin of a captured response, typed by its content type.
    pub fn record_from_body(&self, url: &str, content_type: &str, page_url: &str) -> bool {
        let Some(origin) = origin_of(url) else {
            trace!(url, "no origin in network body url");
            return false;
        };
        self.record_origin(&origin, resource_type_for_content_type(content_type), page_url);
        true
    }

    pub fn record_from_waterfall(&self, url: &str, initiator: InitiatorType, page_url: &str) -> bool {
        let Some(origin) = origin_of(url) else {
            return false;
        };
        self.record_origin(&origin, resource_type_for_initiator(initiator), page_url);
        true
    }

    pub fn generate(&self, params: &CspParams) -> CspResponse {
        build_policy(&self.state.read(), params)
    }

    pub fn entries(&self) -> Vec<OriginEntry> {
        self.state.read().entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn page_count(&self) -> usize {
        self.state.read().pages.len()
    }

    /// Forgets every observation. Only an explicit reset does this; buffer clears never do.
    pub fn reset(&self) -> usize {
        let mut state = self.state.write();
        let removed = state.entries.len();
        *state = AccumulatorState::default();
        removed
    }
}
