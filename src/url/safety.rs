//! Network safety gate
//!
//! Every URL is checked here before any request leaves the process: the
//! initial fetch, each redirect hop, sitemap and robots.txt requests, and
//! broken-link probes. Host names are resolved through [`SafetyGate::resolve`]
//! by the HTTP client itself, so a name cannot pass the check with one answer
//! and connect with another. A failed check is final for that URL.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use thiserror::Error;
use url::{Host, Url};

/// Hostnames that serve cloud instance metadata
const METADATA_HOSTS: &[&str] = &[
    "metadata",
    "metadata.google.internal",
    "metadata.goog",
    "metadata.azure.com",
    "instance-data",
    "instance-data.ec2.internal",
];

/// Reasons a URL is refused by the gate
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SafetyError {
    #[error("unsupported scheme '{0}' (only http and https are allowed)")]
    UnsupportedScheme(String),

    #[error("URL has no host")]
    MissingHost,

    #[error("host '{0}' refers to the local machine")]
    Localhost(String),

    #[error("host '{0}' is a cloud metadata endpoint")]
    MetadataHost(String),

    #[error("host '{host}' resolves to non-public address {addr}")]
    PrivateAddress { host: String, addr: IpAddr },

    #[error("host '{0}' could not be resolved")]
    Unresolvable(String),
}

/// Protocol and private-network check applied before every fetch
#[derive(Debug, Clone, Default)]
pub struct SafetyGate {
    trusted_hosts: Vec<String>,
}

impl SafetyGate {
    /// Creates a gate with no exemptions
    pub fn strict() -> Self {
        Self::default()
    }

    /// Creates a gate that exempts the given host patterns from the
    /// private-network check. Patterns are exact hosts or `*.domain`.
    pub fn with_trusted_hosts(trusted_hosts: Vec<String>) -> Self {
        Self {
            trusted_hosts: trusted_hosts
                .into_iter()
                .map(|h| h.trim().to_lowercase())
                .collect(),
        }
    }

    /// Checks scheme and literal host without touching the network
    pub fn check_url(&self, url: &Url) -> Result<(), SafetyError> {
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(SafetyError::UnsupportedScheme(other.to_string())),
        }

        let host = url.host().ok_or(SafetyError::MissingHost)?;
        let host_str = url.host_str().unwrap_or_default().to_lowercase();

        if self.is_trusted(&host_str) {
            return Ok(());
        }

        match host {
            Host::Ipv4(addr) => check_addr(&host_str, IpAddr::V4(addr)),
            Host::Ipv6(addr) => check_addr(&host_str, IpAddr::V6(addr)),
            Host::Domain(domain) => check_domain_name(&domain.to_lowercase()),
        }
    }

    /// Resolves `host` and keeps only the addresses the gate allows
    ///
    /// This runs inside the HTTP client's connection path, so the addresses
    /// checked are the addresses connected to. Trusted hosts keep every
    /// address. Resolution failure, or an answer with no allowed address,
    /// fails closed.
    pub async fn resolve(&self, host: &str) -> Result<Vec<SocketAddr>, SafetyError> {
        let host = host.trim_end_matches('.').to_lowercase();
        if !self.is_trusted(&host) {
            check_domain_name(&host)?;
        }

        let addrs = tokio::net::lookup_host((host.as_str(), 0))
            .await
            .map_err(|_| SafetyError::Unresolvable(host.clone()))?;

        self.filter_resolved(&host, addrs)
    }

    /// Drops non-public addresses from a resolver answer
    pub fn filter_resolved(
        &self,
        host: &str,
        addrs: impl IntoIterator<Item = SocketAddr>,
    ) -> Result<Vec<SocketAddr>, SafetyError> {
        let trusted = self.is_trusted(host);
        let mut refused = None;
        let mut allowed = Vec::new();

        for addr in addrs {
            if trusted || is_public(addr.ip()) {
                allowed.push(addr);
            } else {
                tracing::debug!("Dropping {} for {}: not a public address", addr.ip(), host);
                refused.get_or_insert(addr.ip());
            }
        }

        match (allowed.is_empty(), refused) {
            (false, _) => Ok(allowed),
            (true, Some(addr)) => Err(SafetyError::PrivateAddress {
                host: host.to_string(),
                addr,
            }),
            (true, None) => Err(SafetyError::Unresolvable(host.to_string())),
        }
    }

    fn is_trusted(&self, host: &str) -> bool {
        self.trusted_hosts
            .iter()
            .any(|pattern| matches_host_pattern(pattern, host))
    }
}

/// Exact host match, or `*.example.com` matching the domain and its subdomains
fn matches_host_pattern(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

fn check_domain_name(domain: &str) -> Result<(), SafetyError> {
    let domain = domain.trim_end_matches('.');

    if domain == "localhost" || domain.ends_with(".localhost") {
        return Err(SafetyError::Localhost(domain.to_string()));
    }

    if METADATA_HOSTS.contains(&domain) {
        return Err(SafetyError::MetadataHost(domain.to_string()));
    }

    Ok(())
}

fn check_addr(host: &str, addr: IpAddr) -> Result<(), SafetyError> {
    if is_public(addr) {
        Ok(())
    } else {
        Err(SafetyError::PrivateAddress {
            host: host.to_string(),
            addr,
        })
    }
}

/// Returns false for loopback, private, link-local and other non-routable ranges
pub fn is_public(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => is_public_v6(v6),
    }
}

fn is_public_v4(addr: Ipv4Addr) -> bool {
    let octets = addr.octets();
    let shared_address_space = octets[0] == 100 && (octets[1] & 0xc0) == 64;

    !(addr.is_loopback()
        || addr.is_private()
        || addr.is_link_local()
        || addr.is_unspecified()
        || addr.is_broadcast()
        || octets[0] == 0
        || shared_address_space)
}

fn is_public_v6(addr: Ipv6Addr) -> bool {
    if let Some(v4) = addr.to_ipv4_mapped() {
        return is_public_v4(v4);
    }

    let first = addr.segments()[0];
    let unique_local = (first & 0xfe00) == 0xfc00;
    let link_local = (first & 0xffc0) == 0xfe80;

    !(addr.is_loopback() || addr.is_unspecified() || unique_local || link_local)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(url: &str) -> Result<(), SafetyError> {
        SafetyGate::strict().check_url(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_public_hosts_pass() {
        assert!(check("https://example.com/").is_ok());
        assert!(check("http://93.184.216.34/page").is_ok());
    }

    #[test]
    fn test_rejects_non_http_schemes() {
        assert!(matches!(
            check("ftp://example.com/"),
            Err(SafetyError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            check("file:///etc/passwd"),
            Err(SafetyError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_rejects_private_ranges() {
        for url in [
            "http://127.0.0.1/",
            "http://169.254.169.254/latest/meta-data/",
            "http://10.1.2.3/",
            "http://192.168.0.10/",
            "http://172.16.5.4/",
            "http://172.31.255.255/",
            "http://0.0.0.0/",
            "http://100.100.100.200/",
            "http://[::1]/",
            "http://[fd00:ec2::254]/",
            "http://[fe80::1]/",
            "http://[::ffff:127.0.0.1]/",
        ] {
            assert!(
                matches!(check(url), Err(SafetyError::PrivateAddress { .. })),
                "{} should be rejected",
                url
            );
        }
    }

    #[test]
    fn test_adjacent_public_ranges_pass() {
        assert!(check("http://172.32.0.1/").is_ok());
        assert!(check("http://11.0.0.1/").is_ok());
        assert!(check("http://192.169.0.1/").is_ok());
    }

    #[test]
    fn test_rejects_localhost_and_metadata_names() {
        assert!(matches!(
            check("http://localhost:8080/"),
            Err(SafetyError::Localhost(_))
        ));
        assert!(matches!(
            check("http://api.localhost/"),
            Err(SafetyError::Localhost(_))
        ));
        assert!(matches!(
            check("http://metadata.google.internal/computeMetadata/v1/"),
            Err(SafetyError::MetadataHost(_))
        ));
    }

    #[test]
    fn test_trusted_hosts_exempt_private_check_only() {
        let gate = SafetyGate::with_trusted_hosts(vec!["127.0.0.1".to_string()]);
        assert!(gate
            .check_url(&Url::parse("http://127.0.0.1:9000/").unwrap())
            .is_ok());
        assert!(gate
            .check_url(&Url::parse("http://10.0.0.1/").unwrap())
            .is_err());
        assert!(gate
            .check_url(&Url::parse("ftp://127.0.0.1/").unwrap())
            .is_err());
    }

    #[test]
    fn test_wildcard_trusted_pattern() {
        assert!(matches_host_pattern("*.test.internal", "a.test.internal"));
        assert!(matches_host_pattern("*.test.internal", "test.internal"));
        assert!(!matches_host_pattern("*.test.internal", "test.internal.evil"));
    }

    fn addr(ip: &str) -> SocketAddr {
        SocketAddr::new(ip.parse().unwrap(), 0)
    }

    #[test]
    fn test_filter_keeps_only_public_addresses() {
        let gate = SafetyGate::strict();
        let kept = gate
            .filter_resolved(
                "rebind.example",
                [addr("127.0.0.1"), addr("93.184.216.34"), addr("169.254.169.254")],
            )
            .unwrap();
        assert_eq!(kept, vec![addr("93.184.216.34")]);
    }

    #[test]
    fn test_filter_fails_closed_when_nothing_is_public() {
        let gate = SafetyGate::strict();
        assert_eq!(
            gate.filter_resolved("rebind.example", [addr("169.254.169.254")]),
            Err(SafetyError::PrivateAddress {
                host: "rebind.example".to_string(),
                addr: "169.254.169.254".parse().unwrap(),
            })
        );
        assert_eq!(
            gate.filter_resolved("empty.example", Vec::<SocketAddr>::new()),
            Err(SafetyError::Unresolvable("empty.example".to_string()))
        );
    }

    #[test]
    fn test_filter_trusts_configured_hosts() {
        let gate = SafetyGate::with_trusted_hosts(vec!["*.test.internal".to_string()]);
        let kept = gate
            .filter_resolved("api.test.internal", [addr("10.0.0.7")])
            .unwrap();
        assert_eq!(kept, vec![addr("10.0.0.7")]);
    }

    #[tokio::test]
    async fn test_resolve_refuses_localhost() {
        let gate = SafetyGate::strict();
        assert!(matches!(
            gate.resolve("localhost").await,
            Err(SafetyError::Localhost(_))
        ));
    }
}
