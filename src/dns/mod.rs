//! DNS Resolution Module
//!
//! Provides the name-resolution half of connection establishment:
//! - [`servers`]: built-in fallback nameservers and override normalization
//! - [`nameserver`]: UDP transport to the override, then the fallback list
//! - [`CustomResolver`]: stub resolver on top of that transport
//! - [`GaiResolver`]: the platform resolver, used when no override is set
//! - [`preference`]: address-family preference and candidate ordering
//!
//! # Example
//!
//! ```rust,ignore
//! use agentnet::dns::{Name, Resolve, Resolver};
//!
//! let resolver = Resolver::from_override(Some("1.1.1.1:53"));
//! let addrs = resolver.resolve(Name::new("example.com")).await?;
//! for addr in addrs {
//!     println!("Resolved: {}", addr.ip());
//! }
//! ```

mod custom;
mod gai;
pub mod nameserver;
pub mod preference;
mod resolve;
pub mod servers;

pub use custom::{CustomResolver, QUERY_ATTEMPTS, QUERY_TIMEOUT};
pub use gai::GaiResolver;
pub use nameserver::{NameserverChain, NAMESERVER_DIAL_TIMEOUT};
pub use preference::{order_candidates, FamilyPreference};
pub use resolve::{lookup_ips, Addrs, Name, Resolve, Resolving};
pub use servers::{normalize_nameserver, FALLBACK_NAMESERVERS};

/// The resolver handed to clients and dialers.
///
/// Without an override this is the platform resolver and the fallback list
/// is never used. With one, lookups go to the override nameserver first.
#[derive(Debug, Clone)]
pub enum Resolver {
    System(GaiResolver),
    Custom(CustomResolver),
}

impl Resolver {
    /// Platform default resolver.
    pub fn system() -> Self {
        Resolver::System(GaiResolver::new())
    }

    /// Builds the resolver for an already-normalized override, if any.
    pub fn from_override(nameserver: Option<&str>) -> Self {
        match nameserver {
            Some(server) if !server.is_empty() => {
                Resolver::Custom(CustomResolver::new(NameserverChain::udp(server)))
            }
            _ => Self::system(),
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Resolver::System(_))
    }

    /// The override nameserver for custom resolvers.
    pub fn nameserver(&self) -> Option<&str> {
        match self {
            Resolver::System(_) => None,
            Resolver::Custom(custom) => Some(custom.nameserver()),
        }
    }
}

impl Resolve for Resolver {
    fn resolve(&self, name: Name) -> Resolving {
        match self {
            Resolver::System(gai) => gai.resolve(name),
            Resolver::Custom(custom) => custom.resolve(name),
        }
    }
}
