//! Environment proxy configuration and HTTP CONNECT tunnelling.
//!
//! `https` targets use `HTTPS_PROXY`, `http` targets use `HTTP_PROXY`
//! (lowercase variants are honoured too), and `NO_PROXY` exempts hosts.
//! `https` targets go through a CONNECT tunnel; `http` requests are
//! forwarded to the proxy in absolute form. The proxy itself may be reached
//! over plain TCP (`http://`) or TLS (`https://`).

use super::matcher::NoProxy;
use crate::base::neterror::NetError;
use base64::{engine::general_purpose, Engine as _};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use url::Url;
use zeroize::Zeroizing;

const MAX_RESPONSE_HEAD: usize = 8 * 1024;

/// One HTTP proxy endpoint.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    url: Url,
    username: Option<String>,
    password: Option<Zeroizing<String>>,
}

impl ProxySettings {
    /// Parses a proxy URL; a missing scheme means `http://`.
    ///
    /// Credentials embedded in the URL are used for `Proxy-Authorization`.
    /// `http` and `https` proxies are supported.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let url = if raw.contains("://") {
            Url::parse(raw).ok()?
        } else {
            Url::parse(&format!("http://{}", raw)).ok()?
        };
        if !matches!(url.scheme(), "http" | "https") {
            tracing::warn!(scheme = %url.scheme(), "unsupported proxy scheme, ignoring proxy");
            return None;
        }
        url.host_str()?;

        let username = (!url.username().is_empty()).then(|| url.username().to_string());
        let password = url.password().map(|p| Zeroizing::new(p.to_string()));
        Some(Self {
            url,
            username,
            password,
        })
    }

    /// Proxy host (brackets stripped) and port, defaulting to 80 or 443.
    pub fn host_port(&self) -> Option<(String, u16)> {
        let host = self.url.host_str()?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        Some((host.to_string(), self.url.port_or_known_default()?))
    }

    /// Whether the connection to the proxy itself is TLS.
    pub fn is_tls(&self) -> bool {
        self.url.scheme() == "https"
    }

    /// `Proxy-Authorization` value, when credentials are configured.
    pub fn auth_header(&self) -> Option<String> {
        let user = self.username.as_deref()?;
        let pass = self.password.as_ref().map(|p| p.as_str()).unwrap_or("");
        let creds = Zeroizing::new(format!("{}:{}", user, pass));
        Some(format!("Basic {}", general_purpose::STANDARD.encode(creds.as_bytes())))
    }
}

/// Proxies selected from the environment.
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    http: Option<ProxySettings>,
    https: Option<ProxySettings>,
    no_proxy: NoProxy,
}

impl ProxyConfig {
    /// No proxy for any target.
    pub fn direct() -> Self {
        Self::default()
    }

    /// Reads `HTTP_PROXY`, `HTTPS_PROXY` and `NO_PROXY`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let var = |upper: &str, lower: &str| get(upper).or_else(|| get(lower));
        Self {
            http: var("HTTP_PROXY", "http_proxy").and_then(|v| ProxySettings::parse(&v)),
            https: var("HTTPS_PROXY", "https_proxy").and_then(|v| ProxySettings::parse(&v)),
            no_proxy: NoProxy::parse(&var("NO_PROXY", "no_proxy").unwrap_or_default()),
        }
    }

    pub fn is_direct(&self) -> bool {
        self.http.is_none() && self.https.is_none()
    }

    /// The proxy to use for a target, if any.
    pub fn proxy_for(&self, scheme: &str, host: &str) -> Option<&ProxySettings> {
        let proxy = match scheme {
            "https" => self.https.as_ref(),
            "http" => self.http.as_ref(),
            _ => None,
        }?;
        if self.no_proxy.bypasses(host) {
            return None;
        }
        Some(proxy)
    }
}

/// Asks the proxy on `stream` to open a tunnel to `host:port`.
pub async fn tunnel<S>(
    stream: &mut S,
    host: &str,
    port: u16,
    auth: Option<String>,
) -> Result<(), NetError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let authority = if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    };

    let mut request = format!(
        "CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n",
        authority = authority
    );
    if let Some(auth) = auth {
        request.push_str(&format!("Proxy-Authorization: {}\r\n", auth));
    }
    request.push_str("\r\n");

    stream
        .write_all(request.as_bytes())
        .await
        .map_err(|e| NetError::TunnelConnectionFailed(e.to_string()))?;

    // Read only the response head; the tunnel payload follows it.
    let mut head = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_RESPONSE_HEAD {
            return Err(NetError::TunnelConnectionFailed(
                "proxy response head too large".into(),
            ));
        }
        let n = stream
            .read(&mut byte)
            .await
            .map_err(|e| NetError::TunnelConnectionFailed(e.to_string()))?;
        if n == 0 {
            return Err(NetError::TunnelConnectionFailed(
                "proxy closed the connection".into(),
            ));
        }
        head.push(byte[0]);
    }

    let head = String::from_utf8_lossy(&head);
    let status_line = head.lines().next().unwrap_or_default();
    let status = status_line.split_whitespace().nth(1).unwrap_or_default();
    if !status_line.starts_with("HTTP/1.") || status != "200" {
        return Err(NetError::TunnelConnectionFailed(status_line.to_string()));
    }

    tracing::debug!(target = %authority, "proxy tunnel established");
    Ok(())
}
