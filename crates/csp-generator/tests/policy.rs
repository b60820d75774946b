use gasoline_csp::{Confidence, CspMode, CspParams, OriginAccumulator};
use pretty_assertions::assert_eq;

const APP: &str = "https://app.example.com/";
const DASHBOARD: &str = "https://app.example.com/dashboard";

fn moderate() -> CspParams {
    CspParams::default()
}

#[test]
fn repeated_observations_across_pages_are_high_confidence() {
    let acc = OriginAccumulator::new();
    for _ in 0..3 {
        acc.record_origin("https://cdn.example.com", "script", APP);
    }
    acc.record_origin("https://cdn.example.com", "script", DASHBOARD);

    let csp = acc.generate(&moderate());
    assert_eq!(csp.directives["script-src"], vec!["https://cdn.example.com".to_string()]);
    assert_eq!(csp.directives["default-src"], vec!["'self'".to_string()]);
    assert_eq!(csp.origin_details[0].confidence, Confidence::High);
    assert_eq!(
        csp.csp_header,
        "default-src 'self'; script-src https://cdn.example.com"
    );
    assert_eq!(csp.header_name, "Content-Security-Policy");
}

#[test]
fn extension_origins_are_filtered_with_reason() {
    let acc = OriginAccumulator::new();
    acc.record_origin("chrome-extension://abc", "script", APP);
    let csp = acc.generate(&moderate());
    assert!(!csp.csp_header.contains("chrome-extension://abc"));
    assert_eq!(csp.filtered_origins.len(), 1);
    assert!(!csp.filtered_origins[0].reason.is_empty());
    assert!(csp.origin_details.is_empty());
    assert_eq!(csp.observations.origins_filtered, 1);
}

#[test]
fn localhost_is_kept_only_when_it_is_the_app() {
    let acc = OriginAccumulator::new();
    let page = "http://localhost:3000/";
    for _ in 0..2 {
        acc.record_origin("http://localhost:3000", "script", page);
        acc.record_origin("http://localhost:5173", "script", page);
    }
    let csp = acc.generate(&moderate());
    assert_eq!(csp.directives["script-src"], vec!["http://localhost:3000".to_string()]);
    assert_eq!(csp.filtered_origins[0].origin, "http://localhost:5173");
}

#[test]
fn single_observations_are_low_except_connect() {
    let acc = OriginAccumulator::new();
    acc.record_origin("https://api.example.com", "connect", APP);
    acc.record_origin("https://ads.example.net", "img", APP);
    let csp = acc.generate(&moderate());

    let api = csp
        .origin_details
        .iter()
        .find(|d| d.origin == "https://api.example.com")
        .expect("api detail");
    assert_eq!(api.confidence, Confidence::Medium);
    assert!(api.included);

    let ads = csp
        .origin_details
        .iter()
        .find(|d| d.origin == "https://ads.example.net")
        .expect("ads detail");
    assert_eq!(ads.confidence, Confidence::Low);
    assert!(!ads.included);
    assert!(ads.exclusion_reason.is_some());
    assert!(!csp.directives.contains_key("img-src"));
    assert!(csp.warnings.iter().any(|w| w.contains("low confidence")));
}

#[test]
fn medium_origins_are_included_in_every_mode() {
    let acc = OriginAccumulator::new();
    acc.record_origin("https://api.example.com", "connect", APP);
    acc.record_origin("https://cdn.example.com", "script", APP);
    acc.record_origin("https://cdn.example.com", "script", APP);

    for mode in [CspMode::Strict, CspMode::Moderate, CspMode::ReportOnly] {
        let csp = acc.generate(&CspParams {
            mode,
            ..CspParams::default()
        });
        assert_eq!(
            csp.csp_header,
            "default-src 'self'; script-src https://cdn.example.com; connect-src https://api.example.com",
            "mode {mode}"
        );
        assert!(csp
            .origin_details
            .iter()
            .all(|d| d.confidence == Confidence::Medium && d.included));
        assert!(csp.warnings.iter().all(|w| !w.contains("confidence")));
    }
}

#[test]
fn report_only_mode_and_report_uri() {
    let acc = OriginAccumulator::new();
    acc.record_origin("https://api.example.com", "connect", APP);
    let csp = acc.generate(&CspParams {
        mode: CspMode::ReportOnly,
        include_report_uri: true,
        exclude_origins: Vec::new(),
    });
    assert_eq!(csp.header_name, "Content-Security-Policy-Report-Only");
    assert_eq!(
        csp.csp_header,
        "default-src 'self'; connect-src https://api.example.com; report-uri /csp-report"
    );
    assert!(csp.meta_tag.starts_with("<meta http-equiv=\"Content-Security-Policy\""));
}

#[test]
fn excluded_origins_are_dropped() {
    let acc = OriginAccumulator::new();
    acc.record_origin("https://api.example.com", "connect", APP);
    let csp = acc.generate(&CspParams {
        exclude_origins: vec!["https://api.example.com".into()],
        ..CspParams::default()
    });
    assert_eq!(csp.csp_header, "default-src 'self'");
    assert_eq!(csp.filtered_origins[0].reason, "Listed in exclude_origins");
}

#[test]
fn output_is_deterministic() {
    let acc = OriginAccumulator::new();
    for origin in ["https://b.example.com", "https://a.example.com", "https://c.example.com"] {
        acc.record_origin(origin, "connect", APP);
        acc.record_origin(origin, "img", APP);
        acc.record_origin(origin, "img", DASHBOARD);
    }
    let first = acc.generate(&moderate());
    let second = acc.generate(&moderate());
    assert_eq!(first.csp_header, second.csp_header);
    assert_eq!(
        first.directives["img-src"],
        vec![
            "https://a.example.com".to_string(),
            "https://b.example.com".to_string(),
            "https://c.example.com".to_string(),
        ]
    );
    assert!(first.csp_header.find("img-src").unwrap() < first.csp_header.find("connect-src").unwrap());
}

#[test]
fn empty_accumulator_warns() {
    let csp = OriginAccumulator::new().generate(&moderate());
    assert_eq!(csp.csp_header, "default-src 'self'");
    assert_eq!(csp.warnings.len(), 1);
    assert!(csp.warnings[0].starts_with("No origins observed yet"));
}

#[test]
fn mode_parses_from_tool_arguments() {
    assert_eq!("report_only".parse::<CspMode>(), Ok(CspMode::ReportOnly));
    assert_eq!("".parse::<CspMode>(), Ok(CspMode::Moderate));
    assert!("lenient".parse::<CspMode>().is_err());
}
