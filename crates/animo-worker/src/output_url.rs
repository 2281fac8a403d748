//! Provider output URL checks.
//!
//! The runner downloads whatever URL the provider hands back, so the URL is
//! screened for internal and metadata hosts before any request is made.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;
use url::{Host, Url};

use crate::error::{WorkerError, WorkerResult};

const MAX_URL_LENGTH: usize = 4096;

/// Host names that resolve to the machine itself or to cloud metadata.
static BLOCKED_DOMAINS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^localhost$").unwrap(),
        Regex::new(r"\.localhost$").unwrap(),
        // Cloud metadata endpoints
        Regex::new(r"^metadata\.").unwrap(),
        Regex::new(r"\.internal$").unwrap(),
    ]
});

fn is_internal_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // Carrier-grade NAT, 100.64.0.0/10
        || (a == 100 && (64..128).contains(&b))
}

fn is_internal_v6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_internal_v4(v4);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // Unique local fc00::/7
        || (first & 0xfe00) == 0xfc00
        // Link local fe80::/10
        || (first & 0xffc0) == 0xfe80
}

fn is_internal_host(host: &Host<&str>) -> bool {
    match host {
        Host::Ipv4(ip) => is_internal_v4(*ip),
        Host::Ipv6(ip) => is_internal_v6(*ip),
        Host::Domain(name) => {
            let name = name.trim_end_matches('.').to_ascii_lowercase();
            BLOCKED_DOMAINS.iter().any(|p| p.is_match(&name))
        }
    }
}

/// Reject output URLs that are malformed, non-HTTP or aimed at internal hosts.
///
/// The screen runs on the parsed host, so numeric, hex and IPv4-mapped
/// spellings of an address are caught. `allow_private` skips it for local
/// setups where the provider is a mock on loopback.
pub fn check_output_url(url: &str, allow_private: bool) -> WorkerResult<()> {
    if url.len() > MAX_URL_LENGTH {
        return Err(WorkerError::unsafe_output_url("URL too long"));
    }

    let parsed = Url::parse(url)
        .map_err(|e| WorkerError::unsafe_output_url(format!("{}: {}", e, url)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(WorkerError::unsafe_output_url(format!(
                "unsupported scheme '{}'",
                scheme
            )))
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| WorkerError::unsafe_output_url("missing host"))?;

    if allow_private {
        return Ok(());
    }

    if is_internal_host(&host) {
        warn!(url = %url, host = %host, "Blocked provider output URL");
        return Err(WorkerError::unsafe_output_url(
            "URL targets an internal or restricted host",
        ));
    }

    Ok(())
}
