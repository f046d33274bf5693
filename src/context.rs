//! Process-wide network context and the factories built on it.
//!
//! A [`NetContext`] holds the custom DNS override and the address-family
//! preference. Both are decided once: the override by the first non-empty
//! [`NetContext::set_custom_dns_server`], the preference by the first caller
//! that needs it. Every client, dialer and resolver built afterwards shares
//! them.
//!
//! The free functions operate on [`NetContext::global`].

use crate::base::neterror::NetError;
use crate::client::{HttpClient, HttpClientConfig};
use crate::dns::preference::InterfaceSource;
use crate::dns::{normalize_nameserver, FamilyPreference, Resolver};
use crate::socket::dialer::{DialContext, Dialer};
use std::sync::{Arc, LazyLock, OnceLock};
use std::time::Duration;

static GLOBAL: LazyLock<NetContext> = LazyLock::new(NetContext::new);

/// Shared DNS override and family preference.
#[derive(Debug)]
pub struct NetContext {
    custom_dns: OnceLock<String>,
    preference: Arc<FamilyPreference>,
    http_config: HttpClientConfig,
}

impl NetContext {
    /// Context scanning the host's real interfaces.
    pub fn new() -> Self {
        Self::with_preference(Arc::new(FamilyPreference::default()))
    }

    /// Context whose family preference comes from `source`.
    pub fn with_interfaces(source: Arc<dyn InterfaceSource>) -> Self {
        Self::with_preference(Arc::new(FamilyPreference::new(source)))
    }

    pub fn with_preference(preference: Arc<FamilyPreference>) -> Self {
        Self {
            custom_dns: OnceLock::new(),
            preference,
            http_config: HttpClientConfig::default(),
        }
    }

    /// Transport policy for clients built from this context.
    pub fn with_http_config(mut self, config: HttpClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// The process-wide context.
    pub fn global() -> &'static NetContext {
        &GLOBAL
    }

    /// Records the custom nameserver.
    ///
    /// Blank input is ignored. The first accepted value is final; later
    /// different values are dropped with a warning.
    pub fn set_custom_dns_server(&self, server: &str) {
        if server.trim().is_empty() {
            return;
        }
        let server = normalize_nameserver(server);

        match self.custom_dns.set(server) {
            Ok(()) => {
                tracing::info!(nameserver = ?self.custom_dns.get(), "custom DNS server configured");
            }
            Err(rejected) => {
                if self.custom_dns.get() != Some(&rejected) {
                    tracing::warn!(
                        current = ?self.custom_dns.get(),
                        rejected = %rejected,
                        "custom DNS server already set, ignoring"
                    );
                }
            }
        }
    }

    /// The normalized override, if one was set.
    pub fn custom_dns_server(&self) -> Option<&str> {
        self.custom_dns.get().map(String::as_str)
    }

    pub fn preference(&self) -> Arc<FamilyPreference> {
        Arc::clone(&self.preference)
    }

    /// `true` if IPv4 candidates are dialed first.
    pub fn prefer_ipv4_first(&self) -> bool {
        self.preference.prefer_ipv4_first()
    }

    /// The resolver every client and dialer uses: the platform resolver
    /// without an override, the override-then-fallback resolver with one.
    pub fn resolver(&self) -> Resolver {
        Resolver::from_override(self.custom_dns_server())
    }

    /// HTTP client with an overall request `timeout` (zero means 30s).
    pub fn http_client(&self, timeout: Duration) -> Result<HttpClient, NetError> {
        HttpClient::new(
            self.resolver(),
            self.preference(),
            timeout,
            self.http_config.clone(),
        )
    }

    /// Plain dialer with an overall `timeout` (zero means 5s).
    pub fn dialer(&self, timeout: Duration) -> Dialer {
        Dialer::new(self.resolver(), timeout)
    }

    /// Ordered dialer; `timeout` bounds the lookup and each candidate
    /// (zero means 15s).
    pub fn dial_context(&self, timeout: Duration) -> DialContext {
        DialContext::new(self.resolver(), self.preference(), timeout)
    }
}

impl Default for NetContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Sets the process-wide custom nameserver. See
/// [`NetContext::set_custom_dns_server`].
pub fn set_custom_dns_server(server: &str) {
    NetContext::global().set_custom_dns_server(server);
}

pub fn build_resolver_capability() -> Resolver {
    NetContext::global().resolver()
}

pub fn build_http_client(timeout: Duration) -> Result<HttpClient, NetError> {
    NetContext::global().http_client(timeout)
}

pub fn build_dialer(timeout: Duration) -> Dialer {
    NetContext::global().dialer(timeout)
}

pub fn build_dial_context(timeout: Duration) -> DialContext {
    NetContext::global().dial_context(timeout)
}
