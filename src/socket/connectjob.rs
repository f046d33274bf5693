//! Sequential connection establishment over resolved candidates.
//!
//! Candidates are dialed one after the other in the order given; the first
//! connection that succeeds wins and nothing else is attempted. There is no
//! racing between families.

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::dns::preference::is_ipv4_family;
use socket2::{SockRef, TcpKeepalive};
use std::{
    future::Future,
    net::{IpAddr, SocketAddr},
    str::FromStr,
    time::Duration,
};
use tokio::net::TcpStream;

/// Per-candidate connect timeout on the HTTP client path.
pub const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// TCP keep-alive idle time applied to every dialed stream.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Stream network selector, as accepted by the dial functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    /// Either family.
    #[default]
    Tcp,
    /// IPv4 only.
    Tcp4,
    /// IPv6 only.
    Tcp6,
}

impl Network {
    /// Whether a candidate of this address family may be dialed.
    /// IPv4-mapped IPv6 addresses belong to the IPv4 family.
    pub fn admits(&self, ip: &IpAddr) -> bool {
        match self {
            Network::Tcp => true,
            Network::Tcp4 => is_ipv4_family(ip),
            Network::Tcp6 => !is_ipv4_family(ip),
        }
    }

    /// The address actually dialed for `ip`, if admitted. `tcp4` unwraps
    /// IPv4-mapped addresses so the connect goes out over IPv4.
    pub fn dial_addr(&self, ip: IpAddr) -> Option<IpAddr> {
        if !self.admits(&ip) {
            return None;
        }
        match self {
            Network::Tcp4 => Some(ip.to_canonical()),
            _ => Some(ip),
        }
    }
}

impl FromStr for Network {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            other => Err(NetError::UnsupportedNetwork(other.to_string())),
        }
    }
}

/// Splits `host:port` or `[v6]:port`.
///
/// The port must be numeric. A bare IPv6 literal without brackets is
/// rejected since its last group cannot be told apart from a port.
pub fn split_host_port(addr: &str) -> Result<(&str, u16), NetError> {
    let (host, port) = if let Some(rest) = addr.strip_prefix('[') {
        let end = rest
            .find(']')
            .ok_or_else(|| NetError::invalid_address(addr, "missing ']'"))?;
        let port = rest[end + 1..]
            .strip_prefix(':')
            .ok_or_else(|| NetError::invalid_address(addr, "missing port"))?;
        (&rest[..end], port)
    } else {
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| NetError::invalid_address(addr, "missing port"))?;
        if host.contains(':') {
            return Err(NetError::invalid_address(addr, "too many colons"));
        }
        (host, port)
    };

    let port = port
        .parse::<u16>()
        .map_err(|_| NetError::invalid_address(addr, "invalid port"))?;
    Ok((host, port))
}

/// Tries `attempt` against each candidate in order and returns the first
/// success. Failed attempts are logged and superseded; if none succeeds the
/// result is [`NetError::DialFailed`].
pub async fn connect_sequential<T, F, Fut>(
    host: &str,
    port: u16,
    candidates: &[IpAddr],
    mut attempt: F,
) -> Result<T, NetError>
where
    F: FnMut(SocketAddr) -> Fut,
    Fut: Future<Output = Result<T, NetError>>,
{
    for ip in candidates {
        let addr = SocketAddr::new(*ip, port);
        match attempt(addr).await {
            Ok(conn) => {
                tracing::debug!(host = %host, addr = %addr, "connected");
                return Ok(conn);
            }
            Err(e) => {
                tracing::debug!(host = %host, addr = %addr, error = %e, "candidate failed");
            }
        }
    }

    Err(NetError::DialFailed {
        host: host.to_string(),
        port,
    })
}

/// Dials TCP candidates one at a time.
///
/// Each attempt opens a fresh socket bounded by its own `timeout`.
#[derive(Debug, Clone, Copy)]
pub struct ConnectJob {
    timeout: Duration,
    keep_alive: Option<Duration>,
}

impl ConnectJob {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            keep_alive: Some(DEFAULT_KEEP_ALIVE),
        }
    }

    /// `None` leaves the OS keep-alive setting untouched.
    pub fn with_keep_alive(mut self, keep_alive: Option<Duration>) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// One TCP connect to `addr`, bounded by the job timeout.
    pub async fn connect_one(&self, host: &str, addr: SocketAddr) -> Result<TcpStream, NetError> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(addr))
            .await?
            .connection_context(host, addr.port())?;

        if let Some(idle) = self.keep_alive {
            let keepalive = TcpKeepalive::new().with_time(idle);
            if let Err(e) = SockRef::from(&stream).set_tcp_keepalive(&keepalive) {
                tracing::debug!(addr = %addr, error = %e, "failed to enable TCP keep-alive");
            }
        }
        Ok(stream)
    }

    /// Connects to the first reachable candidate admitted by `network`.
    pub async fn connect(
        &self,
        network: Network,
        host: &str,
        port: u16,
        candidates: &[IpAddr],
    ) -> Result<TcpStream, NetError> {
        let admitted: Vec<IpAddr> = candidates
            .iter()
            .filter_map(|ip| network.dial_addr(*ip))
            .collect();

        connect_sequential(host, port, &admitted, |addr| self.connect_one(host, addr)).await
    }
}

impl Default for ConnectJob {
    fn default() -> Self {
        Self::new(HTTP_CONNECT_TIMEOUT)
    }
}
