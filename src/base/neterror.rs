use std::sync::Arc;
use thiserror::Error;

/// Errors produced while resolving names and establishing connections.
///
/// The three failure kinds callers usually branch on are
/// [`NetError::InvalidAddress`] (the target could not be split into host and
/// port), [`NetError::NoAvailableNameserver`] (every nameserver transport
/// attempt failed) and [`NetError::DialFailed`] (every resolved candidate
/// refused the connection). None of them is retried internally.
#[derive(Debug, Error, Clone)]
pub enum NetError {
    // Addressing
    #[error("invalid address {addr:?}: {reason}")]
    InvalidAddress { addr: String, reason: &'static str },
    #[error("invalid URL")]
    InvalidUrl,
    #[error("unsupported network {0:?}")]
    UnsupportedNetwork(String),

    // Resolution
    #[error("no available nameserver")]
    NoAvailableNameserver,
    #[error("name not resolved: {domain}")]
    NameNotResolved { domain: String },
    #[error("lookup of {domain} failed: {source}")]
    NameNotResolvedFor {
        domain: String,
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("DNS protocol error: {0}")]
    DnsProtocol(String),

    // Connection
    #[error("connection to {host}:{port} failed: {source}")]
    ConnectionFailedTo {
        host: String,
        port: u16,
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("failed to dial to any resolved address of {host}:{port}")]
    DialFailed { host: String, port: u16 },
    #[error("operation timed out")]
    TimedOut,
    #[error("tunnel connection failed: {0}")]
    TunnelConnectionFailed(String),
    #[error("SSL protocol error")]
    SslProtocolError,

    // HTTP
    #[error("HTTP error: {0}")]
    Http(String),
}

impl NetError {
    pub fn connection_failed_to(host: &str, port: u16, err: std::io::Error) -> Self {
        NetError::ConnectionFailedTo {
            host: host.to_string(),
            port,
            source: Arc::new(err),
        }
    }

    pub fn dns_failed(domain: &str, err: std::io::Error) -> Self {
        NetError::NameNotResolvedFor {
            domain: domain.to_string(),
            source: Arc::new(err),
        }
    }

    pub fn invalid_address(addr: &str, reason: &'static str) -> Self {
        NetError::InvalidAddress {
            addr: addr.to_string(),
            reason,
        }
    }

    /// Whether this error came out of the name-resolution phase.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            NetError::NoAvailableNameserver
                | NetError::NameNotResolved { .. }
                | NetError::NameNotResolvedFor { .. }
                | NetError::DnsProtocol(_)
        )
    }
}

impl From<tokio::time::error::Elapsed> for NetError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        NetError::TimedOut
    }
}
