//! Outbound URL guard for daemon-initiated requests.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use gasoline_core_types::{ToolError, ToolResult};
use tokio::net::lookup_host;
use tracing::debug;
use url::{Host, Url};

#[derive(Clone, Debug, Default)]
pub struct SsrfGuard {
    allow_hosts: Vec<String>,
}

impl SsrfGuard {
    pub fn new(allow_hosts: impl IntoIterator<Item = String>) -> Self {
        Self {
            allow_hosts: allow_hosts
                .into_iter()
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    pub fn is_allowed_host(&self, host: &str) -> bool {
        let host = host.trim_start_matches('[').trim_end_matches(']').to_ascii_lowercase();
        self.allow_hosts.iter().any(|h| *h == host)
    }

    /// Parses `raw` and refuses it when it resolves to a non-public address.
    pub async fn check(&self, param: &str, raw: &str) -> ToolResult<Url> {
        let url = Url::parse(raw)
            .map_err(|err| ToolError::invalid_param(param, format!("invalid URL '{raw}': {err}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            let host = url.host_str().unwrap_or(url.scheme());
            return Err(ToolError::ssrf_blocked(host, "only http and https URLs are allowed")
                .with_param(param));
        }
        let host_str = url
            .host_str()
            .ok_or_else(|| ToolError::invalid_param(param, format!("URL '{raw}' has no host")))?
            .to_string();
        if self.is_allowed_host(&host_str) {
            return Ok(url);
        }
        let reason = match url.host() {
            Some(Host::Ipv4(ip)) => blocked_reason(IpAddr::V4(ip)),
            Some(Host::Ipv6(ip)) => blocked_reason(IpAddr::V6(ip)),
            Some(Host::Domain(domain)) => self.resolve_domain(domain, &url).await?,
            None => Some("missing host"),
        };
        match reason {
            Some(reason) => {
                debug!(host = %host_str, reason, "outbound URL refused");
                Err(ToolError::ssrf_blocked(&host_str, reason).with_param(param))
            }
            None => Ok(url),
        }
    }

    async fn resolve_domain(&self, domain: &str, url: &Url) -> ToolResult<Option<&'static str>> {
        let lowered = domain.to_ascii_lowercase();
        if lowered == "localhost" || lowered.ends_with(".localhost") {
            return Ok(Some("loopback address"));
        }
        let port = url.port_or_known_default().unwrap_or(80);
        let addrs = match lookup_host((domain, port)).await {
            Ok(addrs) => addrs.collect::<Vec<_>>(),
            Err(err) => {
                debug!(domain, ?err, "outbound host did not resolve");
                return Err(ToolError::ssrf_blocked(domain, "host could not be resolved"));
            }
        };
        if addrs.is_empty() {
            return Err(ToolError::ssrf_blocked(domain, "host could not be resolved"));
        }
        Ok(addrs.iter().find_map(|addr| blocked_reason(addr.ip())))
    }
}

/// Why `ip` is not a public destination, if it is not.
pub fn blocked_reason(ip: IpAddr) -> Option<&'static str> {
    match ip {
        IpAddr::V4(v4) => v4_reason(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4_reason(v4),
            None => v6_reason(v6),
        },
    }
}

fn v4_reason(ip: Ipv4Addr) -> Option<&'static str> {
    let [a, b, ..] = ip.octets();
    if ip.is_loopback() {
        Some("loopback address")
    } else if ip.is_private() {
        Some("private address")
    } else if ip.is_link_local() {
        Some("link-local address")
    } else if ip.is_unspecified() || ip.is_broadcast() {
        Some("unspecified address")
    } else if a == 100 && (64..128).contains(&b) {
        Some("carrier-grade NAT address")
    } else {
        None
    }
}

fn v6_reason(ip: Ipv6Addr) -> Option<&'static str> {
    let first = ip.segments()[0];
    if ip.is_loopback() {
        Some("loopback address")
    } else if ip.is_unspecified() {
        Some("unspecified address")
    } else if first & 0xfe00 == 0xfc00 {
        Some("unique-local address")
    } else if first & 0xffc0 == 0xfe80 {
        Some("link-local address")
    } else {
        None
    }
}
