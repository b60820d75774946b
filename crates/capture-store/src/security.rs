use chrono::Utc;
use gasoline_core_types::{NetworkBody, SecurityFlag};
use url::Url;

const CREDENTIAL_KEYS: &[&str] = &[
    "password",
    "passwd",
    "token",
    "access_token",
    "api_key",
    "apikey",
    "secret",
    "auth",
];

/// Flags raised for one captured request. `page_url` is the page that issued it.
pub fn scan_network_body(body: &NetworkBody, page_url: Option<&str>) -> Vec<SecurityFlag> {
    let Ok(parsed) = Url::parse(&body.url) else {
        return Vec::new();
    };
    let mut flags = Vec::new();

    for (key, value) in parsed.query_pairs() {
        if value.is_empty() {
            continue;
        }
        let lowered = key.to_ascii_lowercase();
        if CREDENTIAL_KEYS.contains(&lowered.as_str()) {
            flags.push(SecurityFlag {
                kind: "credential_in_url".into(),
                severity: "high".into(),
                url: body.url.clone(),
                detail: format!("query parameter '{key}' carries {}", redact(&value)),
                timestamp: Utc::now(),
            });
        }
    }

    let page = page_url.or(body.page_url.as_deref());
    if let Some(page) = page.and_then(|p| Url::parse(p).ok()) {
        if page.scheme() == "https" && parsed.scheme() == "http" {
            flags.push(SecurityFlag {
                kind: "mixed_content".into(),
                severity: "medium".into(),
                url: body.url.clone(),
                detail: format!("https page {} loaded an http resource", page.as_str()),
                timestamp: Utc::now(),
            });
        }
    }
    flags
}

/// Keeps a short prefix (and suffix for long values) so the flag is recognisable.
pub fn redact(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let head = |n: usize| chars.iter().take(n).collect::<String>();
    match chars.len() {
        0..=3 => format!("{}***", head(chars.len())),
        4..=6 => format!("{}***", head(3)),
        7..=10 => format!("{}***", head(6)),
        n => {
            let tail: String = chars[n - 3..].iter().collect();
            format!("{}***{tail}", head(6))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(url: &str) -> NetworkBody {
        NetworkBody {
            url: url.into(),
            method: "GET".into(),
            status: 200,
            ..Default::default()
        }
    }

    #[test]
    fn flags_credentials_in_query() {
        let flags = scan_network_body(
            &body("https://api.example.com/v1?api_key=abcdef123456&page=2"),
            None,
        );
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].kind, "credential_in_url");
        assert!(flags[0].detail.contains("abcdef***456"));
        assert!(!flags[0].detail.contains("abcdef123456"));
    }

    #[test]
    fn flags_mixed_content() {
        let flags = scan_network_body(
            &body("http://cdn.example.com/lib.js"),
            Some("https://app.example.com/"),
        );
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].kind, "mixed_content");
    }

    #[test]
    fn clean_requests_raise_nothing() {
        assert!(scan_network_body(&body("https://example.com/?q=token"), Some("https://example.com")).is_empty());
    }

    #[test]
    fn redact_short_values() {
        assert_eq!(redact("ab"), "ab***");
        assert_eq!(redact("abcde"), "abc***");
        assert_eq!(redact("abcdefgh"), "abcdef***");
    }
}
