use crate::base::neterror::NetError;
use boring::ssl::{SslConnector, SslMethod, SslVerifyMode, SslVersion};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_boring::SslStream;

/// Bound on the TLS handshake after TCP is up.
pub const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Client TLS settings for collector connections.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Skip certificate and hostname verification.
    pub ignore_unsafe_cert: bool,
    pub handshake_timeout: Duration,
    pub alpn_protos: Vec<String>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            ignore_unsafe_cert: false,
            handshake_timeout: TLS_HANDSHAKE_TIMEOUT,
            // The pooled client speaks HTTP/1.1 only.
            alpn_protos: vec!["http/1.1".to_string()],
        }
    }
}

impl TlsConfig {
    /// Builds a BoringSSL connector from this configuration.
    pub fn connector(&self) -> Result<SslConnector, NetError> {
        let mut builder =
            SslConnector::builder(SslMethod::tls()).map_err(|_| NetError::SslProtocolError)?;

        builder
            .set_min_proto_version(Some(SslVersion::TLS1_2))
            .map_err(|_| NetError::SslProtocolError)?;

        if !self.alpn_protos.is_empty() {
            let mut alpn_wire = Vec::new();
            for proto in &self.alpn_protos {
                if proto.len() > 255 {
                    return Err(NetError::SslProtocolError);
                }
                alpn_wire.push(proto.len() as u8);
                alpn_wire.extend_from_slice(proto.as_bytes());
            }
            builder
                .set_alpn_protos(&alpn_wire)
                .map_err(|_| NetError::SslProtocolError)?;
        }

        if self.ignore_unsafe_cert {
            tracing::warn!("TLS certificate verification is disabled");
            builder.set_verify(SslVerifyMode::NONE);
        } else {
            builder.set_verify(SslVerifyMode::PEER);
        }

        Ok(builder.build())
    }

    /// Runs the client handshake over `stream`, bounded by `handshake_timeout`.
    pub async fn handshake<S>(
        &self,
        connector: &SslConnector,
        host: &str,
        stream: S,
    ) -> Result<SslStream<S>, NetError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + std::fmt::Debug + 'static,
    {
        let mut config = connector
            .configure()
            .map_err(|_| NetError::SslProtocolError)?;
        if !should_set_sni(host) {
            config.set_use_server_name_indication(false);
        }
        if self.ignore_unsafe_cert {
            config.set_verify_hostname(false);
        }

        let host = host.trim_start_matches('[').trim_end_matches(']');
        tokio::time::timeout(
            self.handshake_timeout,
            tokio_boring::connect(config, host, stream),
        )
        .await?
        .map_err(|e| {
            tracing::debug!(host = %host, error = %e, "TLS handshake failed");
            NetError::SslProtocolError
        })
    }
}

/// Per RFC 6066, SNI must not carry a literal IP address.
pub fn should_set_sni(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.parse::<std::net::IpAddr>().is_err()
}
