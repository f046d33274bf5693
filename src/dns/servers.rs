//! Built-in nameserver registry and override normalization.

/// Port appended to nameserver addresses that do not carry one.
pub const DEFAULT_DNS_PORT: u16 = 53;

/// Public resolvers tried, in this order, when the override is unreachable.
///
/// IPv6 entries come first; the order only breaks ties between equally
/// reachable servers.
pub const FALLBACK_NAMESERVERS: &[&str] = &[
    "[2606:4700:4700::1111]:53", // Cloudflare
    "[2606:4700:4700::1001]:53", // Cloudflare
    "[2001:4860:4860::8888]:53", // Google
    "[2001:4860:4860::8844]:53", // Google
    "114.114.114.114:53",        // 114DNS
    "1.1.1.1:53",                // Cloudflare
    "8.8.8.8:53",                // Google
    "8.8.4.4:53",                // Google
    "223.5.5.5:53",              // AliDNS
    "119.29.29.29:53",           // DNSPod
];

/// Normalizes an operator-supplied nameserver into `host:port` form.
///
/// - `[v6]:port` and `host:port` are returned unchanged.
/// - A bare IPv6 literal is bracketed and gets `:53`.
/// - A bare IPv4 literal or hostname gets `:53`.
/// - Anything else is returned unchanged.
/// - Blank input yields an empty string.
///
/// This is purely syntactic. Malformed input is not rejected here; it fails
/// later when the nameserver is dialed.
pub fn normalize_nameserver(input: &str) -> String {
    let s = input.trim();
    if s.is_empty() {
        return String::new();
    }
    let colons = s.matches(':').count();

    if (s.starts_with('[') && s.contains("]:")) || (colons == 1 && !s.contains(']')) {
        return s.to_string();
    }
    if colons >= 2 && !s.contains(']') {
        return format!("[{}]:{}", s, DEFAULT_DNS_PORT);
    }
    if colons == 0 {
        return format!("{}:{}", s, DEFAULT_DNS_PORT);
    }
    s.to_string()
}

/// Nameservers to try for a given override: the override first, then every
/// fallback entry that differs from it.
pub fn nameserver_candidates(primary: &str) -> impl Iterator<Item = &str> {
    std::iter::once(primary).chain(
        FALLBACK_NAMESERVERS
            .iter()
            .copied()
            .filter(move |server| *server != primary),
    )
}
