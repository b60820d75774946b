use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::accumulator::{AccumulatorState, OriginEntry};
use crate::errors::CspError;
use crate::resource::{directive_for, origin_of, DIRECTIVE_ORDER};

const PAGES_SHOWN: usize = 10;
const MIN_PAGES_FOR_COVERAGE: usize = 5;
const REPORT_URI: &str = "/csp-report";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CspMode {
    Strict,
    #[default]
    Moderate,
    ReportOnly,
}

impl CspMode {
    pub const NAMES: [&'static str; 3] = ["strict", "moderate", "report_only"];

    pub fn as_str(&self) -> &'static str {
        match self {
            CspMode::Strict => "strict",
            CspMode::Moderate => "moderate",
            CspMode::ReportOnly => "report_only",
        }
    }

    pub fn header_name(&self) -> &'static str {
        match self {
            CspMode::ReportOnly => "Content-Security-Policy-Report-Only",
            _ => "Content-Security-Policy",
        }
    }
}

impl fmt::Display for CspMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CspMode {
    type Err = CspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "moderate" => Ok(CspMode::Moderate),
            "strict" => Ok(CspMode::Strict),
            "report_only" => Ok(CspMode::ReportOnly),
            other => Err(CspError::UnknownMode(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CspParams {
    pub mode: CspMode,
    pub include_report_uri: bool,
    pub exclude_origins: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Connect sources are often hit from a single page, so they never score low.
    pub fn score(entry: &OriginEntry) -> Confidence {
        let n = entry.count;
        let p = entry.pages.len();
        if n >= 3 && p >= 2 {
            Confidence::High
        } else if directive_for(&entry.resource_type) == "connect-src" || n >= 2 || p >= 2 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OriginDetail {
    pub origin: String,
    pub directive: &'static str,
    pub confidence: Confidence,
    pub observation_count: u64,
    pub first_seen: String,
    pub last_seen: String,
    pub pages_seen_on: Vec<String>,
    pub included: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusion_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FilteredOrigin {
    pub origin: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CspObservations {
    pub total_resources: u64,
    pub unique_origins: usize,
    pub origins_included: usize,
    pub origins_filtered: usize,
    pub pages_visited: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CspResponse {
    pub csp_header: String,
    pub header_name: &'static str,
    pub meta_tag: String,
    pub directives: BTreeMap<String, Vec<String>>,
    pub origin_details: Vec<OriginDetail>,
    pub filtered_origins: Vec<FilteredOrigin>,
    pub observations: CspObservations,
    pub warnings: Vec<String>,
    pub recommended_next_step: &'static str,
}

/// Reason an origin is development noise rather than part of the app.
fn pollution_reason(origin: &str, page_origins: &BTreeSet<String>) -> Option<&'static str> {
    if origin.starts_with("chrome-extension://") {
        return Some("Browser extension origin (auto-filtered)");
    }
    if origin.starts_with("moz-extension://") {
        return Some("Firefox extension origin (auto-filtered)");
    }
    let host = origin
        .split_once("://")
        .map(|(_, rest)| rest.rsplit_once(':').map_or(rest, |(h, _)| h))?;
    if (host == "localhost" || host == "127.0.0.1") && !page_origins.contains(origin) {
        return Some("Development server on a different port from the app (auto-filtered)");
    }
    None
}

pub(crate) fn build_policy(state: &AccumulatorState, params: &CspParams) -> CspResponse {
    let page_origins: BTreeSet<String> = state.pages.iter().filter_map(|p| origin_of(p)).collect();
    let excluded: BTreeSet<&str> = params.exclude_origins.iter().map(String::as_str).collect();

    let mut directives: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    directives
        .entry("default-src".to_string())
        .or_default()
        .insert("'self'".to_string());

    let mut details = Vec::new();
    let mut filtered = Vec::new();
    let mut unique_origins = BTreeSet::new();
    let mut observations = CspObservations {
        pages_visited: state.pages.len(),
        ..CspObservations::default()
    };

    for entry in state.entries.values() {
        observations.total_resources += entry.count;
        unique_origins.insert(entry.origin.as_str());
        let directive = directive_for(&entry.resource_type);

        if let Some(reason) = pollution_reason(&entry.origin, &page_origins) {
            filtered.push(FilteredOrigin {
                origin: entry.origin.clone(),
                reason: reason.to_string(),
            });
            continue;
        }
        if excluded.contains(entry.origin.as_str()) {
            filtered.push(FilteredOrigin {
                origin: entry.origin.clone(),
                reason: "Listed in exclude_origins".to_string(),
            });
            continue;
        }

        let confidence = Confidence::score(entry);
        let exclusion_reason = match confidence {
            Confidence::Low => Some(
                "Low confidence: observed only once. May be injected by an extension or ad network. \
                 Add to exclude_origins or include manually after verification."
                    .to_string(),
            ),
            Confidence::Medium | Confidence::High => None,
        };
        let included = exclusion_reason.is_none();
        if included {
            directives
                .entry(directive.to_string())
                .or_default()
                .insert(entry.origin.clone());
            observations.origins_included += 1;
        }
        details.push(OriginDetail {
            origin: entry.origin.clone(),
            directive,
            confidence,
            observation_count: entry.count,
            first_seen: entry.first_seen.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            last_seen: entry.last_seen.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            pages_seen_on: entry.pages.iter().take(PAGES_SHOWN).cloned().collect(),
            included,
            exclusion_reason,
        });
    }
    if params.include_report_uri {
        directives
            .entry("report-uri".to_string())
            .or_default()
            .insert(REPORT_URI.to_string());
    }
    observations.unique_origins = unique_origins.len();
    observations.origins_filtered = filtered.len();

    let directives: BTreeMap<String, Vec<String>> = directives
        .into_iter()
        .map(|(name, sources)| (name, sources.into_iter().collect()))
        .collect();
    let csp_header = assemble_header(&directives);
    let meta_tag = format!(r#"<meta http-equiv="Content-Security-Policy" content="{csp_header}">"#);
    let warnings = build_warnings(state, &details);

    CspResponse {
        csp_header,
        header_name: params.mode.header_name(),
        meta_tag,
        directives,
        origin_details: details,
        filtered_origins: filtered,
        observations,
        warnings,
        recommended_next_step: "Deploy as Content-Security-Policy-Report-Only first. Browse all pages \
            again and watch captured console errors for violations. Once none occur, switch to \
            enforcing mode.",
    }
}

/// Canonical directives first, then the rest alphabetically (map order).
pub fn assemble_header(directives: &BTreeMap<String, Vec<String>>) -> String {
    let render = |name: &str, sources: &[String]| format!("{name} {}", sources.join(" "));
    let canonical = DIRECTIVE_ORDER.iter().filter_map(|name| {
        directives
            .get(*name)
            .filter(|s| !s.is_empty())
            .map(|s| render(name, s))
    });
    let extra = directives
        .iter()
        .filter(|(name, sources)| !DIRECTIVE_ORDER.contains(&name.as_str()) && !sources.is_empty())
        .map(|(name, sources)| render(name, sources));
    canonical.chain(extra).collect::<Vec<_>>().join("; ")
}

fn build_warnings(state: &AccumulatorState, details: &[OriginDetail]) -> Vec<String> {
    if state.entries.is_empty() {
        return vec![
            "No origins observed yet. Browse your app to capture resource loading patterns before generating a CSP."
                .to_string(),
        ];
    }
    let mut warnings = Vec::new();
    if state.pages.len() < MIN_PAGES_FOR_COVERAGE {
        warnings.push(format!(
            "Only {} pages visited; exercise every app route for complete coverage.",
            state.pages.len()
        ));
    }
    let low = details
        .iter()
        .filter(|d| d.confidence == Confidence::Low)
        .count();
    if low > 0 {
        warnings.push(format!(
            "{low} origin(s) excluded due to low confidence (seen once). Review origin_details."
        ));
    }
    warnings
}
