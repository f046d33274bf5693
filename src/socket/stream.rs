//! Connected streams handed to the HTTP client.
//!
//! hyper drives I/O through its own `Read`/`Write` traits; [`AgentStream`]
//! adapts whatever the connector built (plain TCP, TLS, TLS to a proxy, TLS
//! through a tunnel) to them and reports connection metadata to the pool.

use hyper::rt::{Read, ReadBufCursor, Write};
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::rt::TokioIo;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Byte stream the connector can layer TLS over.
pub trait Io: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug + 'static {}

impl<T> Io for T where T: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug + 'static {}

pub type BoxedIo = Box<dyn Io>;

/// A dialed connection.
pub struct AgentStream {
    io: TokioIo<BoxedIo>,
    peer: Option<SocketAddr>,
    tls: bool,
    forward_proxy: bool,
}

impl AgentStream {
    pub fn tcp(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        Self::new(Box::new(stream), peer)
    }

    /// Wraps an already layered stream whose socket is connected to `peer`.
    pub fn new(io: BoxedIo, peer: Option<SocketAddr>) -> Self {
        Self {
            io: TokioIo::new(io),
            peer,
            tls: false,
            forward_proxy: false,
        }
    }

    /// Marks the end-to-end session as TLS.
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// The socket talks to a forwarding proxy; requests must use absolute form.
    pub fn with_forward_proxy(mut self, forward_proxy: bool) -> Self {
        self.forward_proxy = forward_proxy;
        self
    }

    pub fn is_tls(&self) -> bool {
        self.tls
    }

    pub fn is_forward_proxy(&self) -> bool {
        self.forward_proxy
    }

    /// Address of the socket's peer (the proxy, when proxied).
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

impl Read for AgentStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_read(cx, buf)
    }
}

impl Write for AgentStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().io).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_shutdown(cx)
    }
}

impl Connection for AgentStream {
    fn connected(&self) -> Connected {
        // CONNECT tunnels look like direct connections; only forwarding
        // proxies need absolute-form request targets.
        Connected::new().proxy(self.forward_proxy)
    }
}

impl fmt::Debug for AgentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentStream")
            .field("tls", &self.tls)
            .field("forward_proxy", &self.forward_proxy)
            .field("peer", &self.peer)
            .finish()
    }
}
