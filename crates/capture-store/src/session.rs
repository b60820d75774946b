use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use gasoline_core_types::TabId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::CaptureError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    #[default]
    Normal,
    InsecureProxy,
}

impl SecurityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityMode::Normal => "normal",
            SecurityMode::InsecureProxy => "insecure_proxy",
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityMode {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(SecurityMode::Normal),
            "insecure_proxy" => Ok(SecurityMode::InsecureProxy),
            other => Err(CaptureError::UnknownSecurityMode(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PageOrigins {
    pub origins: BTreeSet<String>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of the daemon-wide session as reported to tools.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SessionState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_tab: Option<TabId>,
    pub pilot_enabled: bool,
    pub security_mode: SecurityMode,
    pub overrides: BTreeMap<String, Value>,
    pub page_origins: BTreeMap<String, PageOrigins>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_extension_contact: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Returns the previous value. `Value::Null` removes the key.
    pub(crate) fn set_override(
        &mut self,
        key: String,
        value: Value,
        max: usize,
    ) -> Result<Option<Value>, CaptureError> {
        if value.is_null() {
            return Ok(self.overrides.remove(&key));
        }
        if !self.overrides.contains_key(&key) && self.overrides.len() >= max {
            return Err(CaptureError::TooManyOverrides { max });
        }
        Ok(self.overrides.insert(key, value))
    }

    pub(crate) fn record_page_origins(
        &mut self,
        page_url: &str,
        origins: BTreeSet<String>,
        max_pages: usize,
    ) {
        let now = Utc::now();
        self.page_origins
            .entry(page_url.to_string())
            .and_modify(|page| {
                page.origins.extend(origins.iter().cloned());
                page.updated_at = now;
            })
            .or_insert_with(|| PageOrigins {
                origins,
                updated_at: now,
            });
        while self.page_origins.len() > max_pages {
            let stalest = self
                .page_origins
                .iter()
                .min_by_key(|(_, page)| page.updated_at)
                .map(|(url, _)| url.clone());
            match stalest {
                Some(url) => {
                    self.page_origins.remove(&url);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overrides_are_bounded() {
        let mut session = SessionState::default();
        session.set_override("a".into(), json!(1), 1).expect("first");
        assert_eq!(
            session.set_override("b".into(), json!(2), 1),
            Err(CaptureError::TooManyOverrides { max: 1 })
        );
        assert_eq!(
            session.set_override("a".into(), json!(3), 1).expect("replace"),
            Some(json!(1))
        );
        session.set_override("a".into(), Value::Null, 1).expect("remove");
        assert!(session.overrides.is_empty());
    }

    #[test]
    fn page_origins_evict_stalest_page() {
        let mut session = SessionState::default();
        for i in 0..3 {
            let origins = BTreeSet::from([format!("https://cdn{i}.example.com")]);
            session.record_page_origins(&format!("https://app.example.com/{i}"), origins, 2);
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert_eq!(session.page_origins.len(), 2);
        assert!(!session.page_origins.contains_key("https://app.example.com/0"));
    }

    #[test]
    fn security_mode_parses() {
        assert_eq!("insecure_proxy".parse::<SecurityMode>(), Ok(SecurityMode::InsecureProxy));
        assert!("paranoid".parse::<SecurityMode>().is_err());
    }
}
