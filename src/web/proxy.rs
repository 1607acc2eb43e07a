//! Deciding which destinations skip the configured proxy.

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// Loopback is not private, but it never makes sense to proxy it either.
pub const PRIVATE_NETWORKS: [IpNet; 8] = [
    IpNet::V4(Ipv4Net::new_assert(Ipv4Addr::new(127, 0, 0, 0), 8)),
    IpNet::V6(Ipv6Net::new_assert(Ipv6Addr::LOCALHOST, 128)),
    // link-local
    IpNet::V4(Ipv4Net::new_assert(Ipv4Addr::new(169, 254, 0, 0), 16)),
    IpNet::V6(Ipv6Net::new_assert(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), 10)),
    // RFC 1918
    IpNet::V4(Ipv4Net::new_assert(Ipv4Addr::new(10, 0, 0, 0), 8)),
    IpNet::V4(Ipv4Net::new_assert(Ipv4Addr::new(172, 16, 0, 0), 12)),
    IpNet::V4(Ipv4Net::new_assert(Ipv4Addr::new(192, 168, 0, 0), 16)),
    // unique local
    IpNet::V6(Ipv6Net::new_assert(Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 0), 7)),
];

pub fn is_private_ip(ip: &IpAddr) -> bool {
    PRIVATE_NETWORKS.iter().any(|net| net.contains(ip))
}

/// Proxy bypass rules, fixed for the life of the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyBypass {
    bypass_private: bool,
    /// Lowercased domain suffixes.
    domains: Vec<String>,
}

impl ProxyBypass {
    pub fn new<I, S>(bypass_private: bool, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains = domains
            .into_iter()
            .map(|d| d.as_ref().trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        Self { bypass_private, domains }
    }

    pub fn is_enabled(&self) -> bool {
        self.bypass_private || !self.domains.is_empty()
    }

    /// Whether `target` should be reached directly instead of via the proxy.
    ///
    /// `target` is a URL, or a bare hostname when `parse_as_url` is false.
    pub fn should_bypass(&self, target: &str, parse_as_url: bool) -> bool {
        if !self.is_enabled() {
            return false;
        }
        if parse_as_url {
            return Url::parse(target)
                .map(|url| self.should_bypass_url(&url))
                .unwrap_or(false);
        }

        let host = target.trim();
        let host = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host);
        self.bypass_host(&host.to_lowercase(), host.parse().ok())
    }

    pub fn should_bypass_url(&self, url: &Url) -> bool {
        if !self.is_enabled() {
            return false;
        }
        match url.host() {
            Some(Host::Ipv4(ip)) => self.bypass_host(&ip.to_string(), Some(IpAddr::V4(ip))),
            Some(Host::Ipv6(ip)) => self.bypass_host(&ip.to_string(), Some(IpAddr::V6(ip))),
            Some(Host::Domain(domain)) => self.bypass_host(&domain.to_lowercase(), None),
            None => false,
        }
    }

    /// IP literals are checked against both rule kinds: a bypass domain may be
    /// written as an address.
    fn bypass_host(&self, host: &str, ip: Option<IpAddr>) -> bool {
        ip.is_some_and(|ip| self.bypass_ip(&ip)) || self.bypass_domain(host)
    }

    fn bypass_ip(&self, ip: &IpAddr) -> bool {
        self.bypass_private && is_private_ip(ip)
    }

    /// `example.com` covers `example.com` and `*.example.com`, never
    /// `notexample.com`.
    fn bypass_domain(&self, host: &str) -> bool {
        self.domains.iter().any(|domain| {
            host.strip_suffix(domain.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.ends_with('.'))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_never_bypasses() {
        let rules = ProxyBypass::default();
        assert!(!rules.should_bypass("http://127.0.0.1/", true));
        assert!(!rules.should_bypass("localhost", false));
        assert!(!ProxyBypass::new(false, [" ", ""]).is_enabled());
    }

    #[test]
    fn test_private_ips() {
        let rules = ProxyBypass::new(true, Vec::<String>::new());
        assert!(rules.should_bypass("127.0.0.1", false));
        assert!(!rules.should_bypass("8.8.8.8", false));
        for ip in ["10.1.2.3", "172.16.0.1", "172.31.255.255", "192.168.1.1", "169.254.1.1", "::1", "fe80::1", "fd12::1", "[::1]"] {
            assert!(rules.should_bypass(ip, false), "{ip}");
        }
        for ip in ["172.32.0.1", "11.0.0.1", "2001:db8::1", "::ffff:127.0.0.1"] {
            assert!(!rules.should_bypass(ip, false), "{ip}");
        }
    }

    #[test]
    fn test_private_ips_in_urls() {
        let rules = ProxyBypass::new(true, Vec::<String>::new());
        assert!(rules.should_bypass("http://192.168.0.10:1200/feed", true));
        assert!(rules.should_bypass("http://[::1]:8080/", true));
        assert!(!rules.should_bypass("https://1.1.1.1/", true));
        // non-IP hostnames are not an error, just not private
        assert!(!rules.should_bypass("https://localhost/", true));
    }

    #[test]
    fn test_private_off_keeps_private_ips_proxied() {
        let rules = ProxyBypass::new(false, ["example.com"]);
        assert!(!rules.should_bypass("127.0.0.1", false));
    }

    #[test]
    fn test_domain_suffixes() {
        let rules = ProxyBypass::new(false, ["example.com", "Internal.Lan"]);
        assert!(rules.should_bypass("example.com", false));
        assert!(rules.should_bypass("sub.example.com", false));
        assert!(rules.should_bypass("a.b.example.com", false));
        assert!(!rules.should_bypass("notexample.com", false));
        assert!(!rules.should_bypass("example.com.evil.org", false));
        assert!(rules.should_bypass("https://rsshub.internal.lan/twitter", true));
        assert!(rules.should_bypass("https://SUB.Example.COM/feed", true));
        assert!(!rules.should_bypass("https://notexample.com/feed", true));
    }

    #[test]
    fn test_ip_listed_as_domain() {
        let rules = ProxyBypass::new(false, ["10.0.0.5"]);
        assert!(rules.should_bypass("10.0.0.5", false));
        assert!(rules.should_bypass("http://10.0.0.5/rss", true));
        assert!(!rules.should_bypass("10.0.0.6", false));
    }

    #[test]
    fn test_unparseable_url_uses_proxy() {
        let rules = ProxyBypass::new(true, ["example.com"]);
        assert!(!rules.should_bypass("not a url", true));
        assert!(!rules.should_bypass("mailto:someone@example.com", true));
    }

    #[test]
    fn test_shorthand_ipv4_hosts() {
        let rules = ProxyBypass::new(true, Vec::<String>::new());
        // URL host parsing normalises these to 127.0.0.1
        assert!(rules.should_bypass("http://127.1/feed", true));
        assert!(rules.should_bypass("http://0x7f.1/feed", true));
        // a bare hostname is only an IP when written canonically
        assert!(!rules.should_bypass("127.1", false));
        assert!(!rules.should_bypass("0x7f.1", false));
    }
}
