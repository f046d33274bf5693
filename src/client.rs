//! HTTP client whose connections go through the resilient dial path.
//!
//! Requests are pooled by hyper-util's client; every new connection is made
//! by [`ResolvingConnector`]: resolve with the configured resolver, order by
//! address-family preference, connect to the candidates one by one, then
//! go through a proxy (forwarding for `http`, CONNECT for `https`) and wrap
//! in TLS as needed.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//!
//! let client = agentnet::build_http_client(Duration::from_secs(10))?;
//! let resp = client.get("https://collector.example.com/health").await?;
//! println!("Status: {}", resp.status());
//! ```

use crate::base::neterror::NetError;
use crate::dns::{FamilyPreference, Resolver};
use crate::socket::connectjob::{ConnectJob, Network, DEFAULT_KEEP_ALIVE, HTTP_CONNECT_TIMEOUT};
use crate::socket::dialer::{or_default, resolve_candidates};
use crate::socket::proxy::{tunnel, ProxyConfig};
use crate::socket::stream::{AgentStream, BoxedIo};
use crate::socket::tls::{TlsConfig, TLS_HANDSHAKE_TIMEOUT};
use boring::ssl::SslConnector;
use bytes::Bytes;
use http::{header, Method, Request, Response, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client as PoolClient;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use serde::{Deserialize, Serialize};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use tokio::net::TcpStream;

/// Overall request timeout when the caller passes zero.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Static transport policy of the HTTP client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Idle connections kept per host.
    pub max_idle_connections: usize,
    pub idle_timeout: Duration,
    pub tls_handshake_timeout: Duration,
    /// Per-candidate TCP connect timeout.
    pub connect_timeout: Duration,
    pub keep_alive: Duration,
    /// Skip certificate verification (self-signed collectors).
    pub ignore_unsafe_cert: bool,
    /// Honour `HTTP_PROXY`, `HTTPS_PROXY` and `NO_PROXY`.
    pub use_env_proxy: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_idle_connections: 10,
            idle_timeout: Duration::from_secs(90),
            tls_handshake_timeout: TLS_HANDSHAKE_TIMEOUT,
            connect_timeout: HTTP_CONNECT_TIMEOUT,
            keep_alive: DEFAULT_KEEP_ALIVE,
            ignore_unsafe_cert: false,
            use_env_proxy: true,
        }
    }
}

struct ConnectorInner {
    resolver: Resolver,
    preference: Arc<FamilyPreference>,
    job: ConnectJob,
    proxy: ProxyConfig,
    tls: TlsConfig,
    tls_connector: SslConnector,
}

/// Connection factory for the pooled client.
#[derive(Clone)]
pub struct ResolvingConnector {
    inner: Arc<ConnectorInner>,
}

impl ResolvingConnector {
    /// Proxies come from the environment when `config.use_env_proxy` is set.
    pub fn new(
        resolver: Resolver,
        preference: Arc<FamilyPreference>,
        config: &HttpClientConfig,
    ) -> Result<Self, NetError> {
        let proxy = if config.use_env_proxy {
            ProxyConfig::from_env()
        } else {
            ProxyConfig::direct()
        };
        Self::with_proxy(resolver, preference, config, proxy)
    }

    pub fn with_proxy(
        resolver: Resolver,
        preference: Arc<FamilyPreference>,
        config: &HttpClientConfig,
        proxy: ProxyConfig,
    ) -> Result<Self, NetError> {
        let tls = TlsConfig {
            ignore_unsafe_cert: config.ignore_unsafe_cert,
            handshake_timeout: config.tls_handshake_timeout,
            ..TlsConfig::default()
        };
        let tls_connector = tls.connector()?;

        Ok(Self {
            inner: Arc::new(ConnectorInner {
                resolver,
                preference,
                job: ConnectJob::new(config.connect_timeout).with_keep_alive(Some(config.keep_alive)),
                proxy,
                tls,
                tls_connector,
            }),
        })
    }

    pub fn resolver(&self) -> &Resolver {
        &self.inner.resolver
    }

    /// Opens a connection suitable for requests to `uri`.
    pub async fn connect(&self, uri: &Uri) -> Result<AgentStream, NetError> {
        let (scheme, host, port) = target(uri)?;
        let inner = &self.inner;

        let Some(proxy) = inner.proxy.proxy_for(scheme, host) else {
            let tcp = self.dial(host, port).await?;
            if scheme == "https" {
                let peer = tcp.peer_addr().ok();
                let tls = inner.tls.handshake(&inner.tls_connector, host, tcp).await?;
                return Ok(AgentStream::new(Box::new(tls), peer).with_tls(true));
            }
            return Ok(AgentStream::tcp(tcp));
        };

        let (proxy_host, proxy_port) = proxy.host_port().ok_or(NetError::InvalidUrl)?;
        tracing::debug!(proxy = %proxy_host, target = %host, "connecting through proxy");
        let tcp = self.dial(&proxy_host, proxy_port).await?;
        let peer = tcp.peer_addr().ok();
        let mut io: BoxedIo = if proxy.is_tls() {
            Box::new(
                inner
                    .tls
                    .handshake(&inner.tls_connector, &proxy_host, tcp)
                    .await?,
            )
        } else {
            Box::new(tcp)
        };

        if scheme == "https" {
            tunnel(&mut io, host, port, proxy.auth_header()).await?;
            let tls = inner.tls.handshake(&inner.tls_connector, host, io).await?;
            Ok(AgentStream::new(Box::new(tls), peer).with_tls(true))
        } else {
            Ok(AgentStream::new(io, peer)
                .with_tls(proxy.is_tls())
                .with_forward_proxy(true))
        }
    }

    /// `Proxy-Authorization` for requests forwarded to a proxy in absolute
    /// form. Tunnelled requests carry credentials on the CONNECT instead.
    pub fn forward_auth(&self, uri: &Uri) -> Option<String> {
        let (scheme, host, _) = target(uri).ok()?;
        if scheme != "http" {
            return None;
        }
        self.inner.proxy.proxy_for(scheme, host)?.auth_header()
    }

    // The lookup has no timeout of its own; the request timeout bounds it.
    async fn dial(&self, host: &str, port: u16) -> Result<TcpStream, NetError> {
        let inner = &self.inner;
        let candidates =
            resolve_candidates(&inner.resolver, &inner.preference, Network::Tcp, host).await?;
        inner.job.connect(Network::Tcp, host, port, &candidates).await
    }
}

/// Scheme, bracket-free host and port of a request target.
fn target(uri: &Uri) -> Result<(&str, &str, u16), NetError> {
    let scheme = uri.scheme_str().unwrap_or("http");
    let default_port = match scheme {
        "https" => 443,
        "http" => 80,
        _ => return Err(NetError::InvalidUrl),
    };
    let host = uri
        .host()
        .ok_or(NetError::InvalidUrl)?
        .trim_start_matches('[')
        .trim_end_matches(']');
    Ok((scheme, host, uri.port_u16().unwrap_or(default_port)))
}

impl tower_service::Service<Uri> for ResolvingConnector {
    type Response = AgentStream;
    type Error = NetError;
    type Future = Pin<Box<dyn Future<Output = Result<AgentStream, NetError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let connector = self.clone();
        Box::pin(async move { connector.connect(&uri).await })
    }
}

impl std::fmt::Debug for ResolvingConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvingConnector")
            .field("resolver", &self.inner.resolver)
            .field("proxy", &!self.inner.proxy.is_direct())
            .finish_non_exhaustive()
    }
}

/// Pooled HTTP/1.1 client with an overall per-request timeout.
#[derive(Clone)]
pub struct HttpClient {
    pool: PoolClient<ResolvingConnector, Full<Bytes>>,
    connector: ResolvingConnector,
    timeout: Duration,
}

impl HttpClient {
    /// A zero `timeout` means 30 seconds.
    pub fn new(
        resolver: Resolver,
        preference: Arc<FamilyPreference>,
        timeout: Duration,
        config: HttpClientConfig,
    ) -> Result<Self, NetError> {
        let connector = ResolvingConnector::new(resolver, preference, &config)?;
        Ok(Self::with_connector(connector, timeout, &config))
    }

    /// Client over an explicitly built connector.
    pub fn with_connector(
        connector: ResolvingConnector,
        timeout: Duration,
        config: &HttpClientConfig,
    ) -> Self {
        let pool = PoolClient::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(config.max_idle_connections)
            .pool_idle_timeout(config.idle_timeout)
            .build(connector.clone());

        Self {
            pool,
            connector,
            timeout: or_default(timeout, DEFAULT_HTTP_TIMEOUT),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends a request and reads the whole response body.
    ///
    /// The timeout covers connecting, sending and reading the body.
    pub async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, NetError> {
        let mut request = request.map(Full::new);
        if let Some(auth) = self.connector.forward_auth(request.uri()) {
            let value = header::HeaderValue::from_str(&auth)
                .map_err(|e| NetError::Http(e.to_string()))?;
            request.headers_mut().insert(header::PROXY_AUTHORIZATION, value);
        }
        let exchange = async {
            let response = self.pool.request(request).await.map_err(from_client_error)?;
            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| NetError::Http(e.to_string()))?
                .to_bytes();
            Ok::<_, NetError>(Response::from_parts(parts, body))
        };

        tokio::time::timeout(self.timeout, exchange).await?
    }

    pub async fn get(&self, url: &str) -> Result<Response<Bytes>, NetError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(url)
            .body(Bytes::new())
            .map_err(|_| NetError::InvalidUrl)?;
        self.send(request).await
    }

    pub async fn post(
        &self,
        url: &str,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<Response<Bytes>, NetError> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(url)
            .header(header::CONTENT_TYPE, content_type)
            .body(body.into())
            .map_err(|_| NetError::InvalidUrl)?;
        self.send(request).await
    }

    /// POST a JSON body.
    #[cfg(feature = "json")]
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        value: &T,
    ) -> Result<Response<Bytes>, NetError> {
        let body = serde_json::to_vec(value).map_err(|e| NetError::Http(e.to_string()))?;
        self.post(url, "application/json", body).await
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Recovers the dial error when the pool wraps one.
fn from_client_error(err: hyper_util::client::legacy::Error) -> NetError {
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        if let Some(net) = cause.downcast_ref::<NetError>() {
            return net.clone();
        }
        source = cause.source();
    }
    NetError::Http(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn direct_config() -> HttpClientConfig {
        HttpClientConfig {
            use_env_proxy: false,
            ..HttpClientConfig::default()
        }
    }

    fn client(prefer_ipv4: bool, timeout: Duration) -> HttpClient {
        HttpClient::new(
            Resolver::system(),
            Arc::new(FamilyPreference::fixed(prefer_ipv4)),
            timeout,
            direct_config(),
        )
        .unwrap()
    }

    /// Answers every connection with a fixed `200 ok`.
    async fn ok_server() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket
                        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
                        .await;
                });
            }
        });
        port
    }

    #[test]
    fn test_default_policy() {
        let config = HttpClientConfig::default();
        assert_eq!(config.max_idle_connections, 10);
        assert_eq!(config.idle_timeout, Duration::from_secs(90));
        assert_eq!(config.tls_handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert!(config.use_env_proxy);
    }

    #[tokio::test]
    async fn test_zero_timeout_defaults() {
        assert_eq!(client(true, Duration::ZERO).timeout(), DEFAULT_HTTP_TIMEOUT);
    }

    #[tokio::test]
    async fn test_get_over_loopback() {
        let port = ok_server().await;
        let resp = client(true, Duration::from_secs(5))
            .get(&format!("http://127.0.0.1:{}/report", port))
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.body().as_ref(), b"ok");
    }

    #[tokio::test]
    async fn test_ipv6_preference_falls_back_to_ipv4() {
        // localhost usually resolves to ::1 too, which nothing listens on.
        let port = ok_server().await;
        let resp = client(false, Duration::from_secs(5))
            .get(&format!("http://localhost:{}/", port))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_unreachable_reports_dial_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = client(true, Duration::from_secs(5))
            .get(&format!("http://127.0.0.1:{}/", port))
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::DialFailed { .. }), "got {err}");
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let err = client(true, Duration::from_millis(200))
            .get(&format!("http://127.0.0.1:{}/", port))
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::TimedOut));
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let err = client(true, Duration::from_secs(1))
            .get("ftp://127.0.0.1/")
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::InvalidUrl), "got {err}");
    }
}
