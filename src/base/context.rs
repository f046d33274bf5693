//! Attaching the target to raw socket errors.
//!
//! Every `io::Error` that leaves the crate is tagged with what was being
//! reached: candidate connects with `host:port`, lookups and DNS exchanges
//! with the domain. Callers then see one [`NetError`] per phase instead of a
//! bare `io::ErrorKind`.

use crate::base::neterror::NetError;
use std::io;

pub trait IoResultExt<T> {
    /// A failed candidate connect, reported as
    /// [`NetError::ConnectionFailedTo`]. The sequential connector logs these
    /// and moves to the next candidate.
    ///
    /// ```ignore
    /// let stream = TcpStream::connect(addr).await
    ///     .connection_context("collector.example.com", addr.port())?;
    /// ```
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError>;

    /// A failed lookup or nameserver exchange for `domain`, reported as
    /// [`NetError::NameNotResolvedFor`].
    fn dns_context(self, domain: &str) -> Result<T, NetError>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError> {
        self.map_err(|e| NetError::connection_failed_to(host, port, e))
    }

    fn dns_context(self, domain: &str) -> Result<T, NetError> {
        self.map_err(|e| NetError::dns_failed(domain, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_refused_candidate_keeps_target_and_cause() {
        let result: io::Result<()> = Err(Error::from(ErrorKind::ConnectionRefused));
        let err = result.connection_context("collector.example.com", 443).unwrap_err();

        assert!(!err.is_resolution_failure());
        assert!(err.to_string().starts_with("connection to collector.example.com:443 failed"));
        let cause = err
            .source()
            .and_then(|s| s.downcast_ref::<std::sync::Arc<Error>>())
            .unwrap();
        assert_eq!(cause.kind(), ErrorKind::ConnectionRefused);
    }

    #[test]
    fn test_nameserver_read_failure_is_resolution_failure() {
        let result: io::Result<()> = Err(Error::from(ErrorKind::ConnectionRefused));
        let err = result.dns_context("collector.example.com").unwrap_err();

        assert!(err.is_resolution_failure());
        match err {
            NetError::NameNotResolvedFor { domain, .. } => {
                assert_eq!(domain, "collector.example.com");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
