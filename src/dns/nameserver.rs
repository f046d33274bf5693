//! UDP transport to nameservers with override-then-fallback selection.
//!
//! The resolver only needs a connected datagram channel to some nameserver;
//! this module decides which one. The configured override is dialed first.
//! If that fails, the built-in fallback list is walked in order, skipping the
//! entry equal to the override.

use super::servers::nameserver_candidates;
use crate::base::neterror::NetError;
use std::{
    future::Future,
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    pin::Pin,
    sync::Arc,
    time::Duration,
};
use tokio::net::UdpSocket;

/// Bound on a single nameserver dial.
pub const NAMESERVER_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Future returned by [`DialNameserver::dial`].
pub type Dialing<'a> = Pin<Box<dyn Future<Output = io::Result<UdpSocket>> + Send + 'a>>;

/// Opens a datagram channel to one nameserver endpoint (`host:port`).
pub trait DialNameserver: Send + Sync {
    fn dial<'a>(&'a self, endpoint: &'a str) -> Dialing<'a>;
}

impl<D: DialNameserver + ?Sized> DialNameserver for Arc<D> {
    fn dial<'a>(&'a self, endpoint: &'a str) -> Dialing<'a> {
        (**self).dial(endpoint)
    }
}

/// Dials nameservers over UDP: bind an ephemeral local port of the matching
/// family and connect it to the server, bounded by a timeout.
#[derive(Debug, Clone)]
pub struct UdpNameserverDialer {
    timeout: Duration,
}

impl UdpNameserverDialer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for UdpNameserverDialer {
    fn default() -> Self {
        Self::new(NAMESERVER_DIAL_TIMEOUT)
    }
}

impl DialNameserver for UdpNameserverDialer {
    fn dial<'a>(&'a self, endpoint: &'a str) -> Dialing<'a> {
        Box::pin(async move {
            let attempt = async {
                let mut last_err = None;
                // Endpoints may be hostnames; those go through the system resolver.
                for addr in tokio::net::lookup_host(endpoint).await? {
                    match connect_udp(addr).await {
                        Ok(socket) => return Ok(socket),
                        Err(e) => last_err = Some(e),
                    }
                }
                Err(last_err.unwrap_or_else(|| {
                    io::Error::new(io::ErrorKind::NotFound, "nameserver has no address")
                }))
            };

            tokio::time::timeout(self.timeout, attempt)
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "nameserver dial timed out"))?
        })
    }
}

async fn connect_udp(addr: SocketAddr) -> io::Result<UdpSocket> {
    let local = if addr.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(addr).await?;
    Ok(socket)
}

/// An open channel and the endpoint it is connected to.
#[derive(Debug)]
pub struct NameserverChannel {
    pub socket: UdpSocket,
    pub endpoint: String,
}

/// Ordered nameserver selection: override first, fallback list after.
#[derive(Clone)]
pub struct NameserverChain {
    primary: Arc<str>,
    dialer: Arc<dyn DialNameserver>,
}

impl NameserverChain {
    /// `primary` must already be normalized.
    pub fn new(primary: impl Into<Arc<str>>, dialer: Arc<dyn DialNameserver>) -> Self {
        Self {
            primary: primary.into(),
            dialer,
        }
    }

    /// Uses [`UdpNameserverDialer`] with the default 10s bound.
    pub fn udp(primary: impl Into<Arc<str>>) -> Self {
        Self::new(primary, Arc::new(UdpNameserverDialer::default()))
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// Opens a channel to the first reachable nameserver.
    pub async fn open(&self) -> Result<NameserverChannel, NetError> {
        let mut candidates = nameserver_candidates(&self.primary);

        if let Some(primary) = candidates.next() {
            match self.dialer.dial(primary).await {
                Ok(socket) => {
                    return Ok(NameserverChannel {
                        socket,
                        endpoint: primary.to_string(),
                    })
                }
                Err(e) => {
                    tracing::warn!(
                        server = %primary,
                        error = %e,
                        "custom DNS server is unreachable, trying fallback servers"
                    );
                }
            }
        }

        for server in candidates {
            match self.dialer.dial(server).await {
                Ok(socket) => {
                    tracing::debug!(server = %server, "using fallback DNS server");
                    return Ok(NameserverChannel {
                        socket,
                        endpoint: server.to_string(),
                    });
                }
                Err(e) => {
                    tracing::debug!(server = %server, error = %e, "fallback DNS server unreachable");
                }
            }
        }

        Err(NetError::NoAvailableNameserver)
    }
}

impl std::fmt::Debug for NameserverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameserverChain")
            .field("primary", &self.primary)
            .finish_non_exhaustive()
    }
}
