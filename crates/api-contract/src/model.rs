use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::shape::Shape;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    ShapeChange,
    TypeChange,
    ErrorSpike,
    NewField,
    NullField,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 5] = [
        ViolationKind::ShapeChange,
        ViolationKind::TypeChange,
        ViolationKind::ErrorSpike,
        ViolationKind::NewField,
        ViolationKind::NullField,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::ShapeChange => "shape_change",
            ViolationKind::TypeChange => "type_change",
            ViolationKind::ErrorSpike => "error_spike",
            ViolationKind::NewField => "new_field",
            ViolationKind::NullField => "null_field",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ViolationKind::ErrorSpike => Severity::Critical,
            ViolationKind::ShapeChange | ViolationKind::TypeChange => Severity::High,
            ViolationKind::NullField => Severity::Medium,
            ViolationKind::NewField => Severity::Low,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// A detected contract violation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Violation {
    pub endpoint: String,
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub violation_type: ViolationKind,
    pub severity: Severity,
    pub description: String,
    pub affected_call_count: u64,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "ser_opt_time")]
    pub first_seen_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "ser_opt_time")]
    pub last_seen_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_shape: Option<Shape>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_shape: Option<Shape>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub new_fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_value: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub status_history: Vec<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_body: Option<Map<String, Value>>,
}

impl Violation {
    pub fn new(endpoint: &str, kind: ViolationKind, description: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            kind,
            violation_type: kind,
            severity: kind.severity(),
            description: description.into(),
            affected_call_count: 1,
            first_seen_at: None,
            last_seen_at: None,
            expected_shape: None,
            actual_shape: None,
            missing_fields: Vec::new(),
            new_fields: Vec::new(),
            field: None,
            expected_type: None,
            actual_type: None,
            sample_value: None,
            status_history: Vec::new(),
            last_error_body: None,
        }
    }

    pub(crate) fn with_types(mut self, expected: &str, actual: &str) -> Self {
        self.expected_type = Some(expected.to_string());
        self.actual_type = Some(actual.to_string());
        self
    }
}

/// URL substring and ignore list applied to endpoint keys.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignore_endpoints: Vec<String>,
}

impl ContractFilter {
    pub fn matches(&self, endpoint: &str) -> bool {
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            if !endpoint.contains(url) {
                return false;
            }
        }
        !self
            .ignore_endpoints
            .iter()
            .any(|ignore| !ignore.is_empty() && endpoint.contains(ignore.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.url.as_deref().map_or(true, str::is_empty) && self.ignore_endpoints.is_empty()
    }

    pub(crate) fn echo(&self) -> Option<ContractFilter> {
        (!self.is_empty()).then(|| self.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnalyzeSummary {
    pub violations: usize,
    pub endpoints: usize,
    pub total_requests: u64,
    pub clean_endpoints: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContractAnalysis {
    pub action: &'static str,
    #[serde(serialize_with = "ser_time")]
    pub analyzed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "ser_opt_time")]
    pub data_window_started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_filter: Option<ContractFilter>,
    pub summary: AnalyzeSummary,
    pub violations: Vec<Violation>,
    pub tracked_endpoints: usize,
    pub total_requests_analyzed: u64,
    pub clean_endpoints: usize,
    pub possible_violation_types: Vec<ViolationKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EndpointReport {
    pub endpoint: String,
    pub method: String,
    pub call_count: u64,
    pub status_codes: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub established_shape: Option<Shape>,
    pub consistency: String,
    pub consistency_score: f64,
    #[serde(serialize_with = "ser_time")]
    pub first_called_at: DateTime<Utc>,
    #[serde(serialize_with = "ser_time")]
    pub last_called_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContractReport {
    pub action: &'static str,
    #[serde(serialize_with = "ser_time")]
    pub analyzed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_filter: Option<ContractFilter>,
    pub endpoints: Vec<EndpointReport>,
    pub consistency_levels: BTreeMap<&'static str, &'static str>,
}

/// Read-only copy of one endpoint tracker.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EndpointSnapshot {
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub established_shape: Option<Shape>,
    pub call_count: u64,
    pub success_count: u64,
    pub consistent_count: u64,
    pub status_history: Vec<u16>,
    pub field_presence: BTreeMap<String, u64>,
    pub field_types: BTreeMap<String, String>,
    #[serde(serialize_with = "ser_time")]
    pub first_called: DateTime<Utc>,
    #[serde(serialize_with = "ser_time")]
    pub last_called: DateTime<Utc>,
    pub violations: Vec<Violation>,
}

pub(crate) fn rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn ser_time<S: serde::Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&rfc3339(ts))
}

fn ser_opt_time<S: serde::Serializer>(ts: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
    match ts {
        Some(ts) => s.serialize_str(&rfc3339(ts)),
        None => s.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_applies_substring_and_ignore_list() {
        let filter = ContractFilter {
            url: Some("/api".into()),
            ignore_endpoints: vec!["/api/health".into()],
        };
        assert!(filter.matches("GET /api/users"));
        assert!(!filter.matches("GET /api/health"));
        assert!(!filter.matches("GET /static/app.js"));
        assert!(ContractFilter::default().matches("GET /anything"));
        assert!(ContractFilter::default().echo().is_none());
    }

    #[test]
    fn violation_serialises_type_twice() {
        let v = Violation::new("GET /x", ViolationKind::NullField, "Field 'a' became null (was string)")
            .with_types("string", "null");
        let json = serde_json::to_value(&v).expect("serialize");
        assert_eq!(json["type"], "null_field");
        assert_eq!(json["violation_type"], "null_field");
        assert_eq!(json["severity"], "medium");
        assert!(json.get("missing_fields").is_none());
    }
}
