use chrono::{DateTime, Utc};
use gasoline_core_types::TabId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request to open a query. Without a `correlation_id` the registry assigns `q-<n>`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewQuery {
    #[serde(rename = "type")]
    pub kind: String,
    pub params: Value,
    pub tab_id: TabId,
    pub correlation_id: Option<String>,
}

impl NewQuery {
    pub fn new(kind: impl Into<String>, params: Value) -> Self {
        Self {
            kind: kind.into(),
            params,
            ..Self::default()
        }
    }

    pub fn on_tab(mut self, tab_id: TabId) -> Self {
        self.tab_id = tab_id;
        self
    }
}

/// The immutable part of a query, as handed to the extension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingQuery {
    #[serde(rename = "id")]
    pub correlation_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub params: Value,
    pub tab_id: TabId,
    pub client_id: String,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl PendingQuery {
    /// `0` on either side matches anything.
    pub fn matches_tab(&self, tab_id: TabId) -> bool {
        tab_id == 0 || self.tab_id == 0 || self.tab_id == tab_id
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryState {
    Queued,
    Taken,
    Completed,
    Failed,
    Expired,
}

impl QueryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryState::Completed | QueryState::Failed | QueryState::Expired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryState::Queued => "queued",
            QueryState::Taken => "taken",
            QueryState::Completed => "completed",
            QueryState::Failed => "failed",
            QueryState::Expired => "expired",
        }
    }
}

/// Result of a completion attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Applied(QueryState),
    /// The query had already finished; nothing changed.
    AlreadyTerminal(QueryState),
    /// The extension reported progress without finishing.
    StillPending,
}

/// Read-only view of one registry entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuerySnapshot {
    #[serde(flatten)]
    pub query: PendingQuery,
    pub state: QueryState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taken_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Zero-based place among queued queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
}

/// Extension-reported command status after normalisation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandStatus {
    Complete,
    Pending,
    Failed(String),
}

/// Folds the spellings the extension uses into three outcomes.
pub fn normalize_status(raw: &str) -> CommandStatus {
    let lowered = raw.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "" | "ok" | "success" | "succeeded" | "done" | "complete" | "completed" => {
            CommandStatus::Complete
        }
        "pending" | "queued" | "running" | "still_processing" => CommandStatus::Pending,
        "canceled" => CommandStatus::Failed("cancelled".into()),
        _ => CommandStatus::Failed(lowered),
    }
}
