//! `NO_PROXY` matching.
//!
//! Entries are comma separated. `*` disables proxying entirely; IP addresses
//! and CIDR ranges match by address; `example.com` matches the domain and
//! its subdomains while `.example.com` matches subdomains only. Loopback
//! hosts are never proxied.

use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Rule {
    Any,
    Ip(IpAddr),
    Cidr(IpAddr, u8),
    /// Domain plus subdomains.
    Domain(String),
    /// Subdomains only; stored with the leading dot.
    Suffix(String),
}

/// Parsed `NO_PROXY` rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoProxy {
    rules: Vec<Rule>,
}

impl NoProxy {
    pub fn parse(raw: &str) -> Self {
        let rules = raw
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                if entry == "*" {
                    return Rule::Any;
                }
                if let Some((ip, prefix)) = entry.split_once('/') {
                    if let (Ok(ip), Ok(prefix)) = (ip.parse::<IpAddr>(), prefix.parse::<u8>()) {
                        return Rule::Cidr(ip, prefix);
                    }
                }
                if let Ok(ip) = entry.trim_matches(|c| c == '[' || c == ']').parse() {
                    return Rule::Ip(ip);
                }
                let domain = entry.trim_start_matches('*').to_ascii_lowercase();
                if domain.starts_with('.') {
                    Rule::Suffix(domain)
                } else {
                    Rule::Domain(domain)
                }
            })
            .collect();
        Self { rules }
    }

    /// Whether `host` must be reached directly.
    pub fn bypasses(&self, host: &str) -> bool {
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let ip = host.parse::<IpAddr>().ok();

        if host.eq_ignore_ascii_case("localhost") || ip.is_some_and(|ip| ip.is_loopback()) {
            return true;
        }

        let host = host.to_ascii_lowercase();
        self.rules.iter().any(|rule| match (rule, ip) {
            (Rule::Any, _) => true,
            (Rule::Ip(want), Some(ip)) => *want == ip,
            (Rule::Cidr(net, prefix), Some(ip)) => cidr_contains(*net, *prefix, ip),
            (Rule::Domain(domain), None) => {
                host == *domain
                    || (host.ends_with(domain.as_str())
                        && host[..host.len() - domain.len()].ends_with('.'))
            }
            (Rule::Suffix(suffix), None) => host.ends_with(suffix.as_str()),
            _ => false,
        })
    }
}

fn cidr_contains(network: IpAddr, prefix: u8, addr: IpAddr) -> bool {
    match (network, addr) {
        (IpAddr::V4(net), IpAddr::V4(ip)) if prefix <= 32 => {
            let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
            u32::from(net) & mask == u32::from(ip) & mask
        }
        (IpAddr::V6(net), IpAddr::V6(ip)) if prefix <= 128 => {
            let mask = u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0);
            u128::from(net) & mask == u128::from(ip) & mask
        }
        _ => false,
    }
}
