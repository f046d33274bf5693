//! Address-family preference and candidate ordering.
//!
//! A host that has at least one usable IPv4 address tries IPv4 candidates
//! first; a v6-only host tries IPv6 first. The decision is made once, from
//! the interfaces present the first time it is asked for, and never revisited.

use std::{
    net::IpAddr,
    sync::{Arc, OnceLock},
};

/// Snapshot of one local interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInterface {
    pub name: String,
    pub up: bool,
    pub loopback: bool,
    pub addrs: Vec<IpAddr>,
}

/// Source of local interface information.
pub trait InterfaceSource: Send + Sync {
    fn interfaces(&self) -> Vec<LocalInterface>;
}

/// Reads interfaces from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn interfaces(&self) -> Vec<LocalInterface> {
        netdev::get_interfaces()
            .into_iter()
            .map(|iface| LocalInterface {
                up: iface.is_up(),
                loopback: iface.is_loopback(),
                addrs: iface
                    .ipv4
                    .iter()
                    .map(|net| IpAddr::V4(net.addr()))
                    .chain(iface.ipv6.iter().map(|net| IpAddr::V6(net.addr())))
                    .collect(),
                name: iface.name,
            })
            .collect()
    }
}

/// Whether any up, non-loopback interface carries a non-loopback IPv4 address.
pub fn has_usable_ipv4(interfaces: &[LocalInterface]) -> bool {
    interfaces
        .iter()
        .filter(|iface| iface.up && !iface.loopback)
        .flat_map(|iface| iface.addrs.iter())
        .any(|ip| !ip.is_loopback() && ip.is_ipv4())
}

/// Lazily computed, then fixed, family preference.
pub struct FamilyPreference {
    prefer_ipv4: OnceLock<bool>,
    source: Arc<dyn InterfaceSource>,
}

impl FamilyPreference {
    pub fn new(source: Arc<dyn InterfaceSource>) -> Self {
        Self {
            prefer_ipv4: OnceLock::new(),
            source,
        }
    }

    /// Preference already decided, without probing.
    pub fn fixed(prefer_ipv4: bool) -> Self {
        let pref = Self::new(Arc::new(SystemInterfaces));
        let _ = pref.prefer_ipv4.set(prefer_ipv4);
        pref
    }

    /// `true` if IPv4 candidates go first.
    ///
    /// Concurrent first callers block on the same scan; the interface scan
    /// runs at most once.
    pub fn prefer_ipv4_first(&self) -> bool {
        *self.prefer_ipv4.get_or_init(|| {
            let prefer = has_usable_ipv4(&self.source.interfaces());
            tracing::debug!(prefer_ipv4 = prefer, "address family preference detected");
            prefer
        })
    }
}

impl Default for FamilyPreference {
    fn default() -> Self {
        Self::new(Arc::new(SystemInterfaces))
    }
}

impl std::fmt::Debug for FamilyPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FamilyPreference")
            .field("prefer_ipv4", &self.prefer_ipv4.get())
            .finish_non_exhaustive()
    }
}

/// IPv4, including IPv4-mapped IPv6.
pub fn is_ipv4_family(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(_) => true,
        IpAddr::V6(v6) => v6.to_ipv4_mapped().is_some(),
    }
}

/// Stable sort putting the preferred family first.
///
/// Addresses of the same family keep their relative order.
pub fn order_candidates(candidates: &mut [IpAddr], prefer_ipv4: bool) {
    candidates.sort_by_key(|ip| is_ipv4_family(ip) != prefer_ipv4);
}
