use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use gasoline_core_types::{LogEntry, NetworkBody, WebSocketEvent};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::builtin::builtin_rules;
use crate::errors::{NoiseError, NoiseResult};
use crate::rule::{
    validate_pattern, Classification, CompiledRule, MatchSpec, NewRule, NoiseCategory, NoiseRule,
    MAX_RULES,
};

const CONSOLE_REPEAT_THRESHOLD: usize = 10;
const SOURCE_REPEAT_THRESHOLD: usize = 2;
const PATH_REPEAT_THRESHOLD: usize = 20;
pub const AUTO_APPLY_CONFIDENCE: f64 = 0.9;
const INFRA_PATHS: [&str; 6] = ["/health", "/ping", "/ready", "/__", "/sockjs-node", "/ws"];

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NoiseStats {
    pub total_filtered: u64,
    pub per_rule: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_signal_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_noise_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NoiseProposal {
    pub rule: NoiseRule,
    pub confidence: f64,
    pub reason: String,
    pub applied: bool,
}

struct RuleSet {
    compiled: Vec<CompiledRule>,
    next_id: u64,
}

impl RuleSet {
    fn builtin() -> Self {
        let compiled = builtin_rules()
            .into_iter()
            .filter_map(|rule| {
                let id = rule.id.clone();
                CompiledRule::compile(rule, false)
                    .map_err(|err| warn!(rule = %id, %err, "skipping built-in noise rule"))
                    .ok()
            })
            .collect();
        Self {
            compiled,
            next_id: 0,
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }

    fn of(&self, category: NoiseCategory) -> impl Iterator<Item = &CompiledRule> {
        self.compiled
            .iter()
            .filter(move |c| c.rule.category == category)
    }
}

/// Classifies captured telemetry against built-in and user noise rules.
///
/// Lock order is `rules` then `stats`.
pub struct NoiseFilter {
    rules: RwLock<RuleSet>,
    stats: Mutex<NoiseStats>,
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl NoiseFilter {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(RuleSet::builtin()),
            stats: Mutex::new(NoiseStats::default()),
        }
    }

    pub fn list_rules(&self) -> Vec<NoiseRule> {
        self.rules
            .read()
            .compiled
            .iter()
            .map(|c| c.rule.clone())
            .collect()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.read().compiled.len()
    }

    /// Adds user rules as `user_<n>`. Either every rule is added or none is.
    pub fn add_rules(&self, rules: Vec<NewRule>) -> NoiseResult<Vec<NoiseRule>> {
        let mut set = self.rules.write();
        if set.compiled.len() + rules.len() > MAX_RULES {
            return Err(NoiseError::RuleLimit { max: MAX_RULES });
        }
        let now = Utc::now();
        let mut staged = Vec::with_capacity(rules.len());
        let mut next = set.next_id;
        for new in rules {
            next += 1;
            let rule = NoiseRule {
                id: format!("user_{next}"),
                category: new.category,
                classification: new.classification,
                match_spec: new.match_spec,
                auto_detected: false,
                created_at: now,
                reason: new.reason,
            };
            staged.push(CompiledRule::compile(rule, true)?);
        }
        set.next_id = next;
        let added: Vec<NoiseRule> = staged.iter().map(|c| c.rule.clone()).collect();
        set.compiled.extend(staged);
        debug!(count = added.len(), "noise rules added");
        Ok(added)
    }

    pub fn remove_rule(&self, id: &str) -> NoiseResult<NoiseRule> {
        if id.starts_with("builtin_") {
            return Err(NoiseError::BuiltinRule(id.to_string()));
        }
        let mut set = self.rules.write();
        let idx = set
            .compiled
            .iter()
            .position(|c| c.rule.id == id)
            .ok_or_else(|| NoiseError::NotFound(id.to_string()))?;
        Ok(set.compiled.remove(idx).rule)
    }

    /// Back to built-ins only; statistics restart. Returns how many rules were dropped.
    pub fn reset(&self) -> usize {
        let mut set = self.rules.write();
        let before = set.compiled.len();
        *set = RuleSet::builtin();
        let removed = before.saturating_sub(set.compiled.len());
        *self.stats.lock() = NoiseStats::default();
        removed
    }

    /// Turns a single pattern into a `dismiss_<n>` rule: message regex for console, URL regex
    /// otherwise.
    pub fn dismiss(
        &self,
        pattern: &str,
        category: NoiseCategory,
        reason: Option<String>,
    ) -> NoiseResult<NoiseRule> {
        let match_spec = match category {
            NoiseCategory::Console => MatchSpec {
                message_regex: Some(pattern.to_string()),
                ..MatchSpec::default()
            },
            NoiseCategory::Network | NoiseCategory::Websocket => MatchSpec {
                url_regex: Some(pattern.to_string()),
                ..MatchSpec::default()
            },
        };
        let mut set = self.rules.write();
        if set.compiled.len() >= MAX_RULES {
            return Err(NoiseError::RuleLimit { max: MAX_RULES });
        }
        let rule = NoiseRule {
            id: format!("dismiss_{}", set.next_id + 1),
            category,
            classification: Classification::Dismissed,
            match_spec,
            auto_detected: false,
            created_at: Utc::now(),
            reason,
        };
        let compiled = CompiledRule::compile(rule, true)?;
        set.next_id += 1;
        let rule = compiled.rule.clone();
        set.compiled.push(compiled);
        Ok(rule)
    }

    pub fn is_console_noise(&self, entry: &LogEntry) -> bool {
        let (level, message, source) = (
            str_field(entry, "level"),
            str_field(entry, "message"),
            str_field(entry, "source"),
        );
        let set = self.rules.read();
        let hit = set
            .of(NoiseCategory::Console)
            .find(|c| c.matches_console(level, message, source));
        self.record(hit.map(|c| c.rule.id.as_str()))
    }

    /// Authentication failures (401/403) are never noise.
    pub fn is_request_noise(&self, method: &str, url: &str, status: Option<u16>) -> bool {
        if matches!(status, Some(401 | 403)) {
            return false;
        }
        let set = self.rules.read();
        let hit = set
            .of(NoiseCategory::Network)
            .find(|c| c.matches_request(method, url, status));
        self.record(hit.map(|c| c.rule.id.as_str()))
    }

    pub fn is_network_noise(&self, body: &NetworkBody) -> bool {
        self.is_request_noise(&body.method, &body.url, Some(body.status))
    }

    pub fn is_websocket_noise(&self, event: &WebSocketEvent) -> bool {
        let set = self.rules.read();
        let hit = set
            .of(NoiseCategory::Websocket)
            .find(|c| c.matches_websocket(&event.url));
        self.record(hit.map(|c| c.rule.id.as_str()))
    }

    fn record(&self, rule_id: Option<&str>) -> bool {
        let mut stats = self.stats.lock();
        let now = Utc::now();
        match rule_id {
            Some(id) => {
                stats.total_filtered += 1;
                *stats.per_rule.entry(id.to_string()).or_insert(0) += 1;
                stats.last_noise_at = Some(now);
                true
            }
            None => {
                stats.last_signal_at = Some(now);
                false
            }
        }
    }

    pub fn statistics(&self) -> NoiseStats {
        self.stats.lock().clone()
    }

    /// Proposes rules for repetitive console output and chatty infrastructure endpoints.
    /// With `apply`, proposals at or above [`AUTO_APPLY_CONFIDENCE`] become `auto_<n>` rules.
    pub fn auto_detect(
        &self,
        console: &[LogEntry],
        network: &[NetworkBody],
        apply: bool,
    ) -> Vec<NoiseProposal> {
        let mut set = self.rules.write();
        let mut proposals = Vec::new();

        let mut messages: BTreeMap<&str, usize> = BTreeMap::new();
        let mut sources: BTreeMap<&str, usize> = BTreeMap::new();
        for entry in console {
            if let Some(msg) = entry.get("message").and_then(Value::as_str).filter(|m| !m.is_empty()) {
                *messages.entry(msg).or_insert(0) += 1;
            }
            if let Some(src) = entry
                .get("source")
                .and_then(Value::as_str)
                .filter(|s| s.contains("node_modules"))
            {
                *sources.entry(src).or_insert(0) += 1;
            }
        }
        for (msg, count) in messages {
            if count < CONSOLE_REPEAT_THRESHOLD || console_covered(&set, msg, console) {
                continue;
            }
            let spec = MatchSpec {
                message_regex: Some(regex::escape(msg)),
                ..MatchSpec::default()
            };
            proposals.push(proposal(
                NoiseCategory::Console,
                Classification::Repetitive,
                spec,
                frequency_confidence(count),
                format!("message repeated {count} times"),
            ));
        }
        for (src, count) in sources {
            let covered = set
                .of(NoiseCategory::Console)
                .any(|c| c.source.as_ref().is_some_and(|re| re.is_match(src)));
            if count < SOURCE_REPEAT_THRESHOLD || covered {
                continue;
            }
            let spec = MatchSpec {
                source_regex: Some(regex::escape(src)),
                ..MatchSpec::default()
            };
            proposals.push(proposal(
                NoiseCategory::Console,
                Classification::Framework,
                spec,
                0.75,
                format!("node_modules source with {count} entries"),
            ));
        }

        let mut paths: BTreeMap<String, usize> = BTreeMap::new();
        for body in network.iter().filter(|b| (200..300).contains(&b.status)) {
            if let Some(path) = Url::parse(&body.url).ok().map(|u| u.path().to_string()) {
                *paths.entry(path).or_insert(0) += 1;
            }
        }
        for (path, count) in paths {
            let infra = INFRA_PATHS.iter().any(|p| path.contains(p));
            let covered = set
                .of(NoiseCategory::Network)
                .any(|c| c.url.as_ref().is_some_and(|re| re.is_match(&path)));
            if count < PATH_REPEAT_THRESHOLD || !infra || covered {
                continue;
            }
            let spec = MatchSpec {
                url_regex: Some(regex::escape(&path)),
                ..MatchSpec::default()
            };
            proposals.push(proposal(
                NoiseCategory::Network,
                Classification::Infrastructure,
                spec,
                frequency_confidence(count),
                format!("infrastructure path hit {count} times"),
            ));
        }

        proposals.retain(|p| {
            [&p.rule.match_spec.message_regex, &p.rule.match_spec.source_regex, &p.rule.match_spec.url_regex]
                .into_iter()
                .flatten()
                .all(|pattern| validate_pattern("pattern", pattern).is_ok())
        });

        if apply {
            for p in proposals.iter_mut() {
                if p.confidence < AUTO_APPLY_CONFIDENCE || set.compiled.len() >= MAX_RULES {
                    continue;
                }
                let mut rule = p.rule.clone();
                rule.id = set.next_id("auto");
                rule.created_at = Utc::now();
                match CompiledRule::compile(rule, true) {
                    Ok(compiled) => {
                        p.rule = compiled.rule.clone();
                        p.applied = true;
                        set.compiled.push(compiled);
                    }
                    Err(err) => debug!(%err, "auto-detected rule rejected"),
                }
            }
        }
        proposals
    }
}

fn console_covered(set: &RuleSet, msg: &str, console: &[LogEntry]) -> bool {
    if set
        .of(NoiseCategory::Console)
        .any(|c| c.message.as_ref().is_some_and(|re| re.is_match(msg)))
    {
        return true;
    }
    console
        .iter()
        .filter(|e| e.get("message").and_then(Value::as_str) == Some(msg))
        .filter_map(|e| e.get("source").and_then(Value::as_str))
        .any(|src| {
            set.of(NoiseCategory::Console)
                .any(|c| c.source.as_ref().is_some_and(|re| re.is_match(src)))
        })
}

fn str_field<'a>(entry: &'a LogEntry, key: &str) -> &'a str {
    entry.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// `0.7 + count / 100`, capped at 0.99.
fn frequency_confidence(count: usize) -> f64 {
    ((70 + count) as f64 / 100.0).min(0.99)
}

fn proposal(
    category: NoiseCategory,
    classification: Classification,
    match_spec: MatchSpec,
    confidence: f64,
    reason: String,
) -> NoiseProposal {
    NoiseProposal {
        rule: NoiseRule {
            id: String::new(),
            category,
            classification,
            match_spec,
            auto_detected: true,
            created_at: Utc::now(),
            reason: Some(reason.clone()),
        },
        confidence,
        reason,
        applied: false,
    }
}
