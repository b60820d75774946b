use chrono::{DateTime, Utc};

use crate::rule::{Classification, MatchSpec, NoiseCategory, NoiseRule};

use crate::rule::Classification::{Analytics, Cosmetic, Extension, Framework, Infrastructure};

fn rule(
    id: &str,
    category: NoiseCategory,
    classification: Classification,
    match_spec: MatchSpec,
    now: DateTime<Utc>,
) -> NoiseRule {
    NoiseRule {
        id: format!("builtin_{id}"),
        category,
        classification,
        match_spec,
        auto_detected: false,
        created_at: now,
        reason: None,
    }
}

fn message(pattern: &str) -> MatchSpec {
    MatchSpec {
        message_regex: Some(pattern.to_string()),
        ..MatchSpec::default()
    }
}

fn warn_message(pattern: &str) -> MatchSpec {
    MatchSpec {
        level: Some("warn".to_string()),
        ..message(pattern)
    }
}

fn url(pattern: &str) -> MatchSpec {
    MatchSpec {
        url_regex: Some(pattern.to_string()),
        ..MatchSpec::default()
    }
}

/// Rules that are always active and cannot be removed.
pub fn builtin_rules() -> Vec<NoiseRule> {
    let now = Utc::now();
    let console: &[(&str, Classification, MatchSpec)] = &[
        (
            "chrome_extension",
            Extension,
            MatchSpec {
                source_regex: Some("(chrome|moz)-extension://".to_string()),
                ..MatchSpec::default()
            },
        ),
        (
            "service_worker",
            Infrastructure,
            message(r"(?i)(service.?worker|ServiceWorker).*(regist|install|activat|updated)"),
        ),
        ("passive_listener", Cosmetic, message("non-passive event listener")),
        ("deprecation", Cosmetic, message(r"^\[Deprecation\]")),
        ("devtools_sourcemap", Cosmetic, message("DevTools failed to load source map")),
        ("err_blocked", Extension, message("net::ERR_BLOCKED_BY_CLIENT")),
        ("samesite_cookie", Cosmetic, message("Indicate whether to send a cookie")),
        ("third_party_cookie", Cosmetic, message("third-party cookie will be blocked")),
        ("hmr_console", Framework, message(r"^\[(vite|HMR|webpack|next)\]")),
        ("react_devtools", Framework, message("(Download the React DevTools|React DevTools)")),
        ("angular_dev_mode", Framework, message("Angular is running in (the )?development mode")),
        ("vue_devtools", Framework, message(r"(Vue\.js|vue-devtools|Vue Devtools)")),
        ("svelte_hmr", Framework, message(r"\[svelte-hmr\]")),
        ("fast_refresh", Framework, message(r"\[Fast Refresh\]")),
        ("next_dev", Framework, message(r"next-dev\.js")),
        (
            "vite_prebundle",
            Framework,
            message("(Pre-bundling|Optimized dependencies|new dependencies optimized)"),
        ),
        ("cra_disconnect", Framework, message("The development server has disconnected")),
        (
            "react_key_warning",
            Framework,
            warn_message("Each child in a list should have a unique.*key"),
        ),
        (
            "react_update_during_render",
            Framework,
            warn_message("Cannot update a component.*while rendering a different component"),
        ),
        ("react_strict_mode", Framework, message("(StrictMode|Strict Mode).*(double|twice)")),
        (
            "next_hydration_info",
            Framework,
            warn_message("(hydration|Hydration).*(mismatch|failed|warning)"),
        ),
    ];
    let network: &[(&str, Classification, MatchSpec)] = &[
        ("favicon", Cosmetic, url(r"favicon\.ico")),
        (
            "sourcemap_404",
            Cosmetic,
            MatchSpec {
                status_min: Some(400),
                status_max: Some(499),
                ..url(r"\.map(\?|$)")
            },
        ),
        (
            "cors_preflight",
            Infrastructure,
            MatchSpec {
                method: Some("OPTIONS".to_string()),
                status_min: Some(200),
                status_max: Some(299),
                ..MatchSpec::default()
            },
        ),
        (
            "hmr_network",
            Framework,
            url(r"(__vite_ping|hot-update\.(json|js)|__webpack_hmr|sockjs-node|_next/webpack-hmr|webpack-dev-server)"),
        ),
        (
            "google_analytics",
            Analytics,
            url(r"(google-analytics\.com|analytics\.google\.com|googletagmanager\.com|gtag/js)"),
        ),
        ("segment", Analytics, url(r"(api\.segment\.(io|com)|cdn\.segment\.com)")),
        ("mixpanel", Analytics, url(r"(api\.mixpanel\.com|mxpnl\.com)")),
        ("hotjar", Analytics, url(r"\.hotjar\.com")),
        ("amplitude", Analytics, url(r"api\.amplitude\.com")),
        ("plausible", Analytics, url(r"plausible\.io")),
        ("posthog", Analytics, url(r"(app|us|eu)\.posthog\.com")),
        ("datadog_rum", Analytics, url(r"rum\.browser-intake.*\.datadoghq\.(com|eu)")),
        ("sentry", Analytics, url(r"\.ingest\.sentry\.io")),
        ("logrocket", Analytics, url(r"(r\.lr-ingest\.io|r\.lr-in\.com)")),
        ("fullstory", Analytics, url(r"(rs\.fullstory\.com|fullstory\.com/s/fs\.js)")),
        ("heap", Analytics, url(r"(heapanalytics\.com|heap-js\.heap\.io)")),
        ("next_internal", Framework, url("/_next/(static|data|image)/")),
        ("vite_client", Framework, url("/@vite/client")),
        ("webpack_internal", Framework, url("webpack-internal://")),
    ];
    let websocket: &[(&str, Classification, MatchSpec)] = &[
        (
            "ws_hmr",
            Framework,
            url(r"(/__vite_hmr|localhost(:\d+)?/ws(\?|$)|/_next/webpack-hmr|/sockjs-node)"),
        ),
        ("ws_devtools", Extension, url("(devtools|__browser_inspector)")),
    ];

    [
        (NoiseCategory::Console, console),
        (NoiseCategory::Network, network),
        (NoiseCategory::Websocket, websocket),
    ]
    .into_iter()
    .flat_map(|(category, rules)| {
        rules
            .iter()
            .map(move |(id, class, spec)| rule(id, category, *class, spec.clone(), now))
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_and_prefixed() {
        let rules = builtin_rules();
        let ids: HashSet<&str> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), rules.len());
        assert!(rules.iter().all(NoiseRule::is_builtin));
    }
}
