//! Raw stream dialers for callers that bypass HTTP.
//!
//! [`DialContext`] is the full lookup, order, connect sequence with layered
//! timeouts. [`Dialer`] is the simpler variant: lookup through the configured
//! resolver and dial in resolver order under one overall deadline.

use super::connectjob::{
    connect_sequential, split_host_port, ConnectJob, Network, DEFAULT_KEEP_ALIVE,
};
use crate::base::neterror::NetError;
use crate::dns::{lookup_ips, order_candidates, FamilyPreference, Name, Resolve, Resolver};
use std::{net::IpAddr, sync::Arc, time::Duration};
use tokio::net::TcpStream;

/// Default overall timeout for [`Dialer`].
pub const DEFAULT_DIALER_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for [`DialContext`].
pub const DEFAULT_DIAL_CONTEXT_TIMEOUT: Duration = Duration::from_secs(15);

/// Replaces a zero timeout with `default`.
pub(crate) fn or_default(timeout: Duration, default: Duration) -> Duration {
    if timeout.is_zero() {
        default
    } else {
        timeout
    }
}

/// Resolves `host` and returns the candidates admitted by `network`,
/// preferred family first.
pub async fn resolve_candidates<R: Resolve + ?Sized>(
    resolver: &R,
    preference: &FamilyPreference,
    network: Network,
    host: &str,
) -> Result<Vec<IpAddr>, NetError> {
    let mut ips = lookup_ips(resolver, Name::new(host)).await?;
    ips.retain(|ip| network.admits(ip));
    order_candidates(&mut ips, preference.prefer_ipv4_first());
    tracing::debug!(host = %host, candidates = ?ips, "ordered dial candidates");
    Ok(ips)
}

/// Dial function with resolver fallback and family ordering.
///
/// The timeout first bounds the lookup; each candidate then gets the same
/// timeout again for its connect, so the worst case grows with the number of
/// candidates. Dropping the returned future cancels whichever phase is in
/// flight.
#[derive(Debug, Clone)]
pub struct DialContext {
    resolver: Resolver,
    preference: Arc<FamilyPreference>,
    timeout: Duration,
}

impl DialContext {
    /// A zero `timeout` means 15 seconds.
    pub fn new(resolver: Resolver, preference: Arc<FamilyPreference>, timeout: Duration) -> Self {
        Self {
            resolver,
            preference,
            timeout: or_default(timeout, DEFAULT_DIAL_CONTEXT_TIMEOUT),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Dials `addr` (`host:port`) over `network` (`tcp`, `tcp4` or `tcp6`).
    pub async fn dial(&self, network: &str, addr: &str) -> Result<TcpStream, NetError> {
        let network: Network = network.parse()?;
        let (host, port) = split_host_port(addr)?;

        let candidates = tokio::time::timeout(
            self.timeout,
            resolve_candidates(&self.resolver, &self.preference, network, host),
        )
        .await??;

        ConnectJob::new(self.timeout)
            .with_keep_alive(Some(DEFAULT_KEEP_ALIVE))
            .connect(network, host, port, &candidates)
            .await
    }
}

/// Plain dialer using the configured resolver.
///
/// The whole dial, lookup included, shares one deadline. Candidates are
/// tried in the order the resolver returned them.
#[derive(Debug, Clone)]
pub struct Dialer {
    resolver: Resolver,
    timeout: Duration,
    keep_alive: Duration,
}

impl Dialer {
    /// A zero `timeout` means 5 seconds.
    pub fn new(resolver: Resolver, timeout: Duration) -> Self {
        Self {
            resolver,
            timeout: or_default(timeout, DEFAULT_DIALER_TIMEOUT),
            keep_alive: DEFAULT_KEEP_ALIVE,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Dials `addr` (`host:port`) over `network`.
    pub async fn dial(&self, network: &str, addr: &str) -> Result<TcpStream, NetError> {
        let network: Network = network.parse()?;
        let (host, port) = split_host_port(addr)?;
        let job = ConnectJob::new(self.timeout).with_keep_alive(Some(self.keep_alive));

        let dial = async {
            let ips: Vec<IpAddr> = lookup_ips(&self.resolver, Name::new(host))
                .await?
                .into_iter()
                .filter_map(|ip| network.dial_addr(ip))
                .collect();
            connect_sequential(host, port, &ips, |addr| job.connect_one(host, addr)).await
        };

        tokio::time::timeout(self.timeout, dial).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system_ctx(prefer_ipv4: bool, timeout: Duration) -> DialContext {
        DialContext::new(
            Resolver::system(),
            Arc::new(FamilyPreference::fixed(prefer_ipv4)),
            timeout,
        )
    }

    #[test]
    fn test_zero_timeouts_use_defaults() {
        let ctx = system_ctx(true, Duration::ZERO);
        assert_eq!(ctx.timeout(), DEFAULT_DIAL_CONTEXT_TIMEOUT);

        let dialer = Dialer::new(Resolver::system(), Duration::ZERO);
        assert_eq!(dialer.timeout(), DEFAULT_DIALER_TIMEOUT);
        assert_eq!(dialer.keep_alive(), Duration::from_secs(30));
    }

    #[test]
    fn test_explicit_timeout_kept() {
        let dialer = Dialer::new(Resolver::system(), Duration::from_secs(2));
        assert_eq!(dialer.timeout(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_dial_context_rejects_malformed_address() {
        let ctx = system_ctx(true, Duration::from_secs(1));
        let err = ctx.dial("tcp", "no-port-here").await.unwrap_err();
        assert!(matches!(err, NetError::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn test_dial_context_rejects_unknown_network() {
        let ctx = system_ctx(true, Duration::from_secs(1));
        let err = ctx.dial("udp", "127.0.0.1:53").await.unwrap_err();
        assert!(matches!(err, NetError::UnsupportedNetwork(_)));
    }

    #[tokio::test]
    async fn test_dial_context_ip_literal() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let ctx = system_ctx(false, Duration::from_secs(2));
        let stream = ctx.dial("tcp", &addr.to_string()).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap(), addr);
    }

    #[tokio::test]
    async fn test_dialer_localhost() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let dialer = Dialer::new(Resolver::system(), Duration::from_secs(2));
        let stream = dialer.dial("tcp4", &format!("localhost:{}", port)).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap().port(), port);
    }
}
