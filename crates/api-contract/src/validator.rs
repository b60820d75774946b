use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use gasoline_core_types::NetworkBody;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::config::ApiContractCfg;
use crate::endpoint::normalize_endpoint;
use crate::model::{
    AnalyzeSummary, ContractAnalysis, ContractFilter, ContractReport, EndpointReport,
    EndpointSnapshot, Violation, ViolationKind,
};
use crate::shape::Shape;

struct EndpointTracker {
    endpoint: String,
    established: Option<Shape>,
    call_count: u64,
    success_count: u64,
    consistent_count: u64,
    status_history: VecDeque<u16>,
    field_presence: BTreeMap<String, u64>,
    field_types: BTreeMap<String, String>,
    first_called: DateTime<Utc>,
    last_called: DateTime<Utc>,
    violations: VecDeque<Violation>,
}

impl EndpointTracker {
    fn new(endpoint: String, now: DateTime<Utc>) -> Self {
        Self {
            endpoint,
            established: None,
            call_count: 0,
            success_count: 0,
            consistent_count: 0,
            status_history: VecDeque::new(),
            field_presence: BTreeMap::new(),
            field_types: BTreeMap::new(),
            first_called: now,
            last_called: now,
            violations: VecDeque::new(),
        }
    }

    fn snapshot(&self) -> EndpointSnapshot {
        EndpointSnapshot {
            endpoint: self.endpoint.clone(),
            established_shape: self.established.clone(),
            call_count: self.call_count,
            success_count: self.success_count,
            consistent_count: self.consistent_count,
            status_history: self.status_history.iter().copied().collect(),
            field_presence: self.field_presence.clone(),
            field_types: self.field_types.clone(),
            first_called: self.first_called,
            last_called: self.last_called,
            violations: self.violations.iter().cloned().collect(),
        }
    }

    fn report(&self) -> EndpointReport {
        let mut status_codes = BTreeMap::new();
        for status in &self.status_history {
            *status_codes.entry(status.to_string()).or_insert(0) += 1;
        }
        let score = if self.call_count == 0 {
            1.0
        } else {
            self.consistent_count as f64 / self.call_count as f64
        };
        EndpointReport {
            endpoint: self.endpoint.clone(),
            method: self
                .endpoint
                .split_once(' ')
                .map(|(m, _)| m.to_string())
                .unwrap_or_else(|| self.endpoint.clone()),
            call_count: self.call_count,
            status_codes,
            established_shape: self.established.clone().filter(|s| s.as_object().is_some()),
            consistency: format!("{:.0}%", score * 100.0),
            consistency_score: score,
            first_called_at: self.first_called,
            last_called_at: self.last_called,
        }
    }

    /// Counts top-level fields of a 2xx shape and remembers their latest scalar type.
    fn record_fields(&mut self, shape: &Shape) {
        let Some(fields) = shape.as_object() else {
            return;
        };
        for (field, field_shape) in fields {
            *self.field_presence.entry(field.clone()).or_insert(0) += 1;
            if let Shape::Scalar(scalar) = field_shape {
                self.field_types
                    .insert(field.clone(), scalar.as_str().to_string());
            }
        }
    }

    /// Folds a 2xx shape into the established one, counting consistency.
    fn learn(&mut self, shape: Shape) {
        self.record_fields(&shape);
        let merged = match self.established.take() {
            None => {
                self.consistent_count += 1;
                shape
            }
            Some(established) => {
                if compare(&self.endpoint, &established, &shape, &Value::Null).is_empty() {
                    self.consistent_count += 1;
                }
                established.merge(&shape)
            }
        };
        self.established = Some(merged);
    }

    fn add_violation(&mut self, mut violation: Violation, now: DateTime<Utc>, cap: usize) {
        if let Some(existing) = self
            .violations
            .iter_mut()
            .find(|v| v.kind == violation.kind && v.endpoint == violation.endpoint)
        {
            existing.affected_call_count += 1;
            existing.last_seen_at = Some(now);
            return;
        }
        violation.first_seen_at = Some(now);
        violation.last_seen_at = Some(now);
        while self.violations.len() >= cap.max(1) {
            self.violations.pop_front();
        }
        self.violations.push_back(violation);
    }

    fn detect_error_spike(&self, body: &NetworkBody, cfg: &ApiContractCfg) -> Option<Violation> {
        let history: Vec<u16> = self.status_history.iter().copied().collect();
        if history.len() < 3 || body.status < 500 {
            return None;
        }
        let streak = history.iter().rev().take_while(|s| **s >= 400).count();
        let before = &history[..history.len() - streak];
        let successes = before
            .iter()
            .rev()
            .take(cfg.spike_window)
            .filter(|s| (200..300).contains(*s))
            .count();
        if streak < cfg.spike_min_errors || successes < cfg.spike_min_successes {
            return None;
        }
        let mut violation = Violation::new(
            &self.endpoint,
            ViolationKind::ErrorSpike,
            format!("Endpoint returned success {successes} times, then started returning errors"),
        );
        violation.status_history = history;
        violation.last_error_body = serde_json::from_str::<Value>(&body.response_body)
            .ok()
            .and_then(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            });
        Some(violation)
    }
}

/// Learns response shapes per endpoint and reports drift from them.
pub struct ApiContractValidator {
    cfg: ApiContractCfg,
    trackers: RwLock<BTreeMap<String, EndpointTracker>>,
}

impl Default for ApiContractValidator {
    fn default() -> Self {
        Self::new(ApiContractCfg::default())
    }
}

impl ApiContractValidator {
    pub fn new(cfg: ApiContractCfg) -> Self {
        Self {
            cfg,
            trackers: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &ApiContractCfg {
        &self.cfg
    }

    /// Records one response and returns the violations it raised.
    pub fn observe(&self, body: &NetworkBody) -> Vec<Violation> {
        self.observe_at(body, Utc::now())
    }

    pub fn observe_at(&self, body: &NetworkBody, now: DateTime<Utc>) -> Vec<Violation> {
        let endpoint = normalize_endpoint(&body.method, &body.url);
        let is_success = (200..300).contains(&body.status);
        let parsed = if is_success { parse_json_body(body) } else { None };
        let shape = parsed
            .as_ref()
            .map(|value| Shape::extract(value, self.cfg.max_shape_depth));

        let mut trackers = self.trackers.write();
        if !trackers.contains_key(&endpoint) && trackers.len() >= self.cfg.max_endpoints {
            debug!(%endpoint, "endpoint limit reached; response ignored");
            return Vec::new();
        }
        let tracker = trackers
            .entry(endpoint.clone())
            .or_insert_with(|| EndpointTracker::new(endpoint.clone(), now));
        tracker.call_count += 1;
        tracker.last_called = now;
        tracker.status_history.push_back(body.status);
        while tracker.status_history.len() > self.cfg.status_history.max(1) {
            tracker.status_history.pop_front();
        }

        if body.status >= 400 {
            let Some(spike) = tracker.detect_error_spike(body, &self.cfg) else {
                return Vec::new();
            };
            tracker.add_violation(spike.clone(), now, self.cfg.max_violations_per_endpoint);
            return vec![spike];
        }
        if !is_success {
            return Vec::new();
        }

        if tracker.success_count < self.cfg.min_calls_to_establish {
            tracker.success_count += 1;
            if let Some(shape) = shape {
                tracker.learn(shape);
            }
            return Vec::new();
        }
        tracker.success_count += 1;

        let (Some(shape), Some(parsed)) = (shape, parsed) else {
            return Vec::new();
        };
        tracker.record_fields(&shape);
        let violations = match tracker.established.as_ref() {
            Some(established) => compare(&endpoint, established, &shape, &parsed),
            None => Vec::new(),
        };
        if violations.is_empty() {
            tracker.consistent_count += 1;
        }
        for violation in &violations {
            tracker.add_violation(violation.clone(), now, self.cfg.max_violations_per_endpoint);
        }
        tracker.established = Some(match tracker.established.take() {
            Some(established) => established.merge(&shape),
            None => shape,
        });
        violations
    }

    pub fn analyze(&self, filter: &ContractFilter) -> ContractAnalysis {
        let trackers = self.trackers.read();
        let mut violations = Vec::new();
        let mut tracked = 0;
        let mut clean = 0;
        let mut total_requests = 0;
        let mut earliest: Option<DateTime<Utc>> = None;
        for (endpoint, tracker) in trackers.iter() {
            if !filter.matches(endpoint) {
                continue;
            }
            tracked += 1;
            total_requests += tracker.call_count;
            earliest = Some(earliest.map_or(tracker.first_called, |e| e.min(tracker.first_called)));
            if tracker.violations.is_empty() {
                clean += 1;
            } else {
                violations.extend(tracker.violations.iter().cloned());
            }
        }
        drop(trackers);
        violations.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));

        let hint = violations.is_empty().then(|| {
            if tracked > 0 {
                format!(
                    "No violations detected. All {tracked} tracked endpoint(s) have consistent response shapes."
                )
            } else {
                "No violations detected. No endpoints tracked yet; browse your application to capture API traffic."
                    .to_string()
            }
        });
        ContractAnalysis {
            action: "analyzed",
            analyzed_at: Utc::now(),
            data_window_started_at: earliest,
            applied_filter: filter.echo(),
            summary: AnalyzeSummary {
                violations: violations.len(),
                endpoints: tracked,
                total_requests,
                clean_endpoints: clean,
            },
            violations,
            tracked_endpoints: tracked,
            total_requests_analyzed: total_requests,
            clean_endpoints: clean,
            possible_violation_types: ViolationKind::ALL.to_vec(),
            hint,
        }
    }

    pub fn report(&self, filter: &ContractFilter) -> ContractReport {
        let mut endpoints: Vec<EndpointReport> = self
            .trackers
            .read()
            .iter()
            .filter(|(endpoint, _)| filter.matches(endpoint))
            .map(|(_, tracker)| tracker.report())
            .collect();
        endpoints.sort_by(|a, b| b.call_count.cmp(&a.call_count));

        let consistency_levels = BTreeMap::from([
            ("1.0", "Perfect: all responses match the established schema"),
            ("0.9-0.99", "Good: occasional minor deviations"),
            ("0.7-0.89", "Degraded: frequent schema mismatches, investigate"),
            ("below 0.7", "Poor: the endpoint contract is unstable"),
        ]);
        ContractReport {
            action: "report",
            analyzed_at: Utc::now(),
            applied_filter: filter.echo(),
            endpoints,
            consistency_levels,
        }
    }

    /// Drops every tracker; returns how many endpoints were tracked.
    pub fn clear(&self) -> usize {
        let mut trackers = self.trackers.write();
        let removed = trackers.len();
        trackers.clear();
        removed
    }

    pub fn endpoint(&self, key: &str) -> Option<EndpointSnapshot> {
        self.trackers.read().get(key).map(EndpointTracker::snapshot)
    }

    pub fn endpoint_count(&self) -> usize {
        self.trackers.read().len()
    }
}

fn parse_json_body(body: &NetworkBody) -> Option<Value> {
    if body.response_body.is_empty() {
        return None;
    }
    if !body.content_type.is_empty() && !body.content_type.contains("json") {
        return None;
    }
    serde_json::from_str(&body.response_body).ok()
}

fn compare(endpoint: &str, expected: &Shape, actual: &Shape, actual_data: &Value) -> Vec<Violation> {
    match (expected, actual) {
        (Shape::Object(expected_fields), Shape::Object(actual_fields)) => {
            let mut violations = Vec::new();
            let missing: Vec<String> = expected_fields
                .keys()
                .filter(|k| !actual_fields.contains_key(*k))
                .cloned()
                .collect();
            if !missing.is_empty() {
                let mut v = Violation::new(
                    endpoint,
                    ViolationKind::ShapeChange,
                    format!("Field(s) missing from response: {}", missing.join(", ")),
                );
                v.missing_fields = missing;
                v.expected_shape = Some(expected.clone());
                v.actual_shape = Some(actual.clone());
                violations.push(v);
            }
            let new_fields: Vec<String> = actual_fields
                .keys()
                .filter(|k| !expected_fields.contains_key(*k))
                .cloned()
                .collect();
            if !new_fields.is_empty() {
                let mut v = Violation::new(
                    endpoint,
                    ViolationKind::NewField,
                    format!("New field(s) appeared in response: {}", new_fields.join(", ")),
                );
                v.new_fields = new_fields;
                violations.push(v);
            }
            for (field, expected_shape) in expected_fields {
                let Some(actual_shape) = actual_fields.get(field) else {
                    continue;
                };
                let was = expected_shape.type_name();
                let now = actual_shape.type_name();
                if was == now {
                    continue;
                }
                let mut v = if now == "null" {
                    Violation::new(
                        endpoint,
                        ViolationKind::NullField,
                        format!("Field '{field}' became null (was {was})"),
                    )
                } else {
                    let mut v = Violation::new(
                        endpoint,
                        ViolationKind::TypeChange,
                        format!("Field '{field}' changed type from {was} to {now}"),
                    );
                    v.sample_value = actual_data.get(field).cloned();
                    v
                }
                .with_types(was, now);
                v.field = Some(field.clone());
                violations.push(v);
            }
            violations
        }
        (Shape::Array(expected_elem), Shape::Array(actual_elem)) => {
            let sample = actual_data.get(0).cloned().unwrap_or(Value::Null);
            compare(endpoint, expected_elem, actual_elem, &sample)
        }
        _ if expected.type_name() != actual.type_name() => vec![Violation::new(
            endpoint,
            ViolationKind::TypeChange,
            "Response type changed",
        )
        .with_types(expected.type_name(), actual.type_name())],
        _ => Vec::new(),
    }
}
