use gasoline_core_types::InitiatorType;
use url::Url;

/// Canonical emission order; anything else follows alphabetically.
pub const DIRECTIVE_ORDER: [&str; 12] = [
    "default-src",
    "script-src",
    "style-src",
    "img-src",
    "font-src",
    "connect-src",
    "frame-src",
    "media-src",
    "worker-src",
    "base-uri",
    "form-action",
    "frame-ancestors",
];

pub fn directive_for(resource_type: &str) -> &'static str {
    match resource_type {
        "script" => "script-src",
        "style" => "style-src",
        "font" => "font-src",
        "img" => "img-src",
        "connect" => "connect-src",
        "frame" => "frame-src",
        "media" => "media-src",
        "worker" => "worker-src",
        _ => "default-src",
    }
}

/// Maps a response content type (parameters ignored) to a resource category.
pub fn resource_type_for_content_type(content_type: &str) -> &'static str {
    let lowered = content_type.to_ascii_lowercase();
    let ct = lowered.split(';').next().unwrap_or_default().trim();
    if ct.contains("javascript") {
        "script"
    } else if ct == "text/css" {
        "style"
    } else if ct.starts_with("font/")
        || ct.starts_with("application/font")
        || ct.starts_with("application/x-font-")
    {
        "font"
    } else if ct.starts_with("image/") {
        "img"
    } else if ct.starts_with("audio/") || ct.starts_with("video/") {
        "media"
    } else {
        "connect"
    }
}

pub fn resource_type_for_initiator(initiator: InitiatorType) -> &'static str {
    match initiator {
        InitiatorType::Script => "script",
        InitiatorType::Stylesheet => "style",
        InitiatorType::Img => "img",
        InitiatorType::Font => "font",
        InitiatorType::Media => "media",
        InitiatorType::Document => "frame",
        InitiatorType::Xhr | InitiatorType::Fetch | InitiatorType::Other => "connect",
    }
}

/// `scheme://host[:port]`, or `None` for URLs without a host.
pub fn origin_of(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_map_to_resource_types() {
        assert_eq!(resource_type_for_content_type("application/javascript; charset=utf-8"), "script");
        assert_eq!(resource_type_for_content_type("Text/CSS"), "style");
        assert_eq!(resource_type_for_content_type("font/woff2"), "font");
        assert_eq!(resource_type_for_content_type("application/x-font-ttf"), "font");
        assert_eq!(resource_type_for_content_type("image/svg+xml"), "img");
        assert_eq!(resource_type_for_content_type("video/webm"), "media");
        assert_eq!(resource_type_for_content_type("application/json"), "connect");
        assert_eq!(resource_type_for_content_type(""), "connect");
    }

    #[test]
    fn origins_keep_explicit_ports() {
        assert_eq!(origin_of("https://cdn.example.com/a.js?x=1").as_deref(), Some("https://cdn.example.com"));
        assert_eq!(origin_of("http://localhost:5173/@vite/client").as_deref(), Some("http://localhost:5173"));
        assert_eq!(origin_of("https://example.com:443/").as_deref(), Some("https://example.com"));
        assert_eq!(origin_of("data:image/png;base64,AAAA"), None);
        assert_eq!(origin_of("/relative"), None);
    }

    #[test]
    fn unknown_types_fall_back_to_default_src() {
        assert_eq!(directive_for("worker"), "worker-src");
        assert_eq!(directive_for("object"), "default-src");
    }
}
