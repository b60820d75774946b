use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("uuid regex")
});
static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("numeric regex"));
static HEX_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-f]{16,}$").expect("hex regex"));
static RELATIVE_BASE: Lazy<Option<Url>> = Lazy::new(|| Url::parse("http://relative.invalid/").ok());

/// `METHOD /path` with the query stripped and id-like segments replaced by `{id}`.
pub fn normalize_endpoint(method: &str, raw_url: &str) -> String {
    let method = method.to_ascii_uppercase();
    let parsed = Url::parse(raw_url).or_else(|err| match RELATIVE_BASE.as_ref() {
        Some(base) if raw_url.starts_with('/') => base.join(raw_url),
        _ => Err(err),
    });
    let Ok(parsed) = parsed else {
        return format!("{method} {raw_url}");
    };
    let path = match parsed.path() {
        "" => "/",
        p => p,
    };
    let normalized: Vec<&str> = path
        .split('/')
        .map(|segment| {
            if !segment.is_empty() && is_dynamic(segment) {
                "{id}"
            } else {
                segment
            }
        })
        .collect();
    format!("{method} {}", normalized.join("/"))
}

fn is_dynamic(segment: &str) -> bool {
    UUID_SEGMENT.is_match(segment) || NUMERIC_SEGMENT.is_match(segment) || HEX_SEGMENT.is_match(segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_dynamic_segments() {
        assert_eq!(
            normalize_endpoint("get", "https://api.example.com/users/42/posts?page=2"),
            "GET /users/{id}/posts"
        );
        assert_eq!(
            normalize_endpoint(
                "DELETE",
                "https://api.example.com/items/550e8400-e29b-41d4-a716-446655440000"
            ),
            "DELETE /items/{id}"
        );
        assert_eq!(
            normalize_endpoint("GET", "https://x.dev/blobs/deadbeefdeadbeef00"),
            "GET /blobs/{id}"
        );
        assert_eq!(
            normalize_endpoint("GET", "https://x.dev/blobs/DEADBEEFDEADBEEF00"),
            "GET /blobs/DEADBEEFDEADBEEF00"
        );
    }

    #[test]
    fn uuid_must_fill_the_whole_segment() {
        assert_eq!(
            normalize_endpoint(
                "GET",
                "https://api.example.com/users/user-550e8400-e29b-41d4-a716-446655440000-x"
            ),
            "GET /users/user-550e8400-e29b-41d4-a716-446655440000-x"
        );
        assert_eq!(
            normalize_endpoint("GET", "https://api.example.com/users/550E8400-E29B-41D4-A716-446655440000"),
            "GET /users/{id}"
        );
    }

    #[test]
    fn empty_path_is_root_and_relative_urls_work() {
        assert_eq!(normalize_endpoint("GET", "https://api.example.com"), "GET /");
        assert_eq!(normalize_endpoint("post", "/api/v1/orders/7"), "POST /api/v1/orders/{id}");
        assert_eq!(normalize_endpoint("GET", "::not a url::"), "GET ::not a url::");
    }
}
