use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{NoiseError, NoiseResult};

pub const MAX_RULES: usize = 100;
pub const MAX_PATTERN_LEN: usize = 512;

static NESTED_QUANTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[+*?}]\s*\)?\s*[+*?]").expect("nested quantifier regex"));

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseCategory {
    #[default]
    Console,
    Network,
    Websocket,
}

impl NoiseCategory {
    pub const NAMES: [&'static str; 3] = ["console", "network", "websocket"];

    pub fn as_str(&self) -> &'static str {
        match self {
            NoiseCategory::Console => "console",
            NoiseCategory::Network => "network",
            NoiseCategory::Websocket => "websocket",
        }
    }
}

impl fmt::Display for NoiseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoiseCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "console" => Ok(NoiseCategory::Console),
            "network" => Ok(NoiseCategory::Network),
            "websocket" => Ok(NoiseCategory::Websocket),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Extension,
    Framework,
    Cosmetic,
    Analytics,
    Infrastructure,
    Repetitive,
    #[default]
    Dismissed,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_min: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_max: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl MatchSpec {
    fn has_matcher(&self) -> bool {
        self.message_regex.is_some()
            || self.source_regex.is_some()
            || self.url_regex.is_some()
            || self.method.is_some()
            || self.status_min.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseRule {
    pub id: String,
    pub category: NoiseCategory,
    pub classification: Classification,
    pub match_spec: MatchSpec,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub auto_detected: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl NoiseRule {
    pub fn is_builtin(&self) -> bool {
        self.id.starts_with("builtin_")
    }
}

/// Caller-supplied rule before an id is assigned.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NewRule {
    pub category: NoiseCategory,
    pub classification: Classification,
    pub match_spec: MatchSpec,
    pub reason: Option<String>,
}

/// Rejects overlong patterns and nested quantifiers like `(a+)+`.
pub fn validate_pattern(field: &'static str, pattern: &str) -> NoiseResult<()> {
    if pattern.len() > MAX_PATTERN_LEN {
        return Err(NoiseError::PatternTooLong {
            field,
            max: MAX_PATTERN_LEN,
        });
    }
    if NESTED_QUANTIFIER.is_match(pattern) {
        return Err(NoiseError::NestedQuantifier { field });
    }
    Ok(())
}

pub(crate) struct CompiledRule {
    pub(crate) rule: NoiseRule,
    pub(crate) message: Option<Regex>,
    pub(crate) source: Option<Regex>,
    pub(crate) url: Option<Regex>,
}

impl CompiledRule {
    /// `checked` applies the pattern safety rules; built-in rules skip them.
    pub(crate) fn compile(rule: NoiseRule, checked: bool) -> NoiseResult<Self> {
        let spec = &rule.match_spec;
        if !spec.has_matcher() {
            return Err(NoiseError::EmptyMatch);
        }
        let message = compile_field("message_regex", spec.message_regex.as_deref(), checked)?;
        let source = compile_field("source_regex", spec.source_regex.as_deref(), checked)?;
        let url = compile_field("url_regex", spec.url_regex.as_deref(), checked)?;
        Ok(Self {
            rule,
            message,
            source,
            url,
        })
    }

    /// Level gate, then message or source.
    pub(crate) fn matches_console(&self, level: &str, message: &str, source: &str) -> bool {
        if let Some(want) = self.rule.match_spec.level.as_deref() {
            if want != level {
                return false;
            }
        }
        self.message.as_ref().is_some_and(|re| re.is_match(message))
            || self.source.as_ref().is_some_and(|re| re.is_match(source))
    }

    /// Method and status gates, then the URL regex; without one the gates alone decide.
    pub(crate) fn matches_request(&self, method: &str, url: &str, status: Option<u16>) -> bool {
        let spec = &self.rule.match_spec;
        if let Some(want) = spec.method.as_deref() {
            if !want.eq_ignore_ascii_case(method) {
                return false;
            }
        }
        if let Some(min) = spec.status_min {
            if status.map_or(true, |s| s < min) {
                return false;
            }
        }
        if let Some(max) = spec.status_max {
            if status.map_or(true, |s| s > max) {
                return false;
            }
        }
        match &self.url {
            Some(re) => re.is_match(url),
            None => spec.method.is_some() || spec.status_min.is_some(),
        }
    }

    pub(crate) fn matches_websocket(&self, url: &str) -> bool {
        self.url.as_ref().is_some_and(|re| re.is_match(url))
    }
}

fn compile_field(
    field: &'static str,
    pattern: Option<&str>,
    checked: bool,
) -> NoiseResult<Option<Regex>> {
    let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    if checked {
        validate_pattern(field, pattern)?;
    }
    Regex::new(pattern)
        .map(Some)
        .map_err(|err| NoiseError::InvalidRegex {
            field,
            message: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nested_quantifiers_and_long_patterns() {
        assert_eq!(
            validate_pattern("url_regex", "(a+)+"),
            Err(NoiseError::NestedQuantifier { field: "url_regex" })
        );
        assert!(validate_pattern("url_regex", "(x{1,3})*").is_err());
        assert!(validate_pattern("url_regex", &"a".repeat(MAX_PATTERN_LEN + 1)).is_err());
        assert!(validate_pattern("url_regex", r"favicon\.ico").is_ok());
        assert!(validate_pattern("url_regex", r"\.map(\?|$)").is_ok());
    }

    #[test]
    fn invalid_regex_is_reported() {
        let rule = NoiseRule {
            id: "user_1".into(),
            category: NoiseCategory::Console,
            classification: Classification::Dismissed,
            match_spec: MatchSpec {
                message_regex: Some("(unclosed".into()),
                ..MatchSpec::default()
            },
            auto_detected: false,
            created_at: Utc::now(),
            reason: None,
        };
        assert!(matches!(
            CompiledRule::compile(rule, true),
            Err(NoiseError::InvalidRegex { field: "message_regex", .. })
        ));
    }
}
