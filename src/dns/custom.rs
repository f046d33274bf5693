//! Resolver that talks to an operator-chosen nameserver.
//!
//! Every query asks [`NameserverChain`] for a datagram channel, so an
//! unreachable override transparently falls back to the public resolvers.
//! DNS message encoding and decoding is hickory's; this module only frames
//! one request/response exchange per attempt.

use super::nameserver::NameserverChain;
use super::{Addrs, Name, Resolve, Resolving};
use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use hickory_resolver::proto::{
    op::{Message, MessageType, OpCode, Query, ResponseCode},
    rr::{Name as DnsName, RData, RecordType},
    serialize::binary::{BinDecodable, BinEncodable},
};
use std::{
    io,
    net::{IpAddr, SocketAddr},
    time::Duration,
};
use tokio::net::UdpSocket;

/// How long to wait for a response on an open channel.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Exchanges per record type before giving up.
pub const QUERY_ATTEMPTS: usize = 2;

const MAX_DATAGRAM: usize = 4096;

/// Stub resolver bound to an override nameserver with fallback.
#[derive(Clone, Debug)]
pub struct CustomResolver {
    chain: NameserverChain,
    query_timeout: Duration,
    attempts: usize,
}

impl CustomResolver {
    pub fn new(chain: NameserverChain) -> Self {
        Self {
            chain,
            query_timeout: QUERY_TIMEOUT,
            attempts: QUERY_ATTEMPTS,
        }
    }

    /// Overrides the per-attempt response timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Overrides the number of exchanges per record type (at least one).
    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// The configured override nameserver.
    pub fn nameserver(&self) -> &str {
        self.chain.primary()
    }

    async fn lookup(&self, domain: &str) -> Result<Vec<IpAddr>, NetError> {
        let mut name =
            DnsName::from_ascii(domain).map_err(|e| NetError::DnsProtocol(e.to_string()))?;
        name.set_fqdn(true);

        let mut ips = Vec::new();
        let mut last_err = None;
        for rtype in [RecordType::A, RecordType::AAAA] {
            match self.query(domain, &name, rtype).await {
                Ok(mut found) => ips.append(&mut found),
                Err(e) => {
                    tracing::debug!(domain = %domain, rtype = %rtype, error = %e, "query failed");
                    last_err = Some(e);
                }
            }
        }

        if ips.is_empty() {
            return Err(last_err.unwrap_or_else(|| NetError::NameNotResolved {
                domain: domain.to_string(),
            }));
        }
        Ok(ips)
    }

    async fn query(
        &self,
        domain: &str,
        name: &DnsName,
        rtype: RecordType,
    ) -> Result<Vec<IpAddr>, NetError> {
        let mut last_err = NetError::TimedOut;
        for attempt in 1..=self.attempts {
            let channel = self.chain.open().await?;
            match exchange(&channel.socket, domain, name, rtype, self.query_timeout).await {
                Ok(response) => return addresses(response),
                Err(e) => {
                    tracing::debug!(
                        server = %channel.endpoint,
                        attempt,
                        error = %e,
                        "DNS exchange failed"
                    );
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}

impl Resolve for CustomResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.clone();
        Box::pin(async move {
            if let Some(ip) = name.as_ip() {
                return Ok(Box::new(std::iter::once(SocketAddr::new(ip, 0))) as Addrs);
            }

            let domain = name.as_str();
            tracing::debug!(domain = %domain, server = %resolver.nameserver(), "resolving via custom DNS");
            let ips = resolver.lookup(domain).await?;
            tracing::debug!(domain = %domain, count = ips.len(), "custom DNS resolution complete");

            let addrs: Vec<SocketAddr> = ips.into_iter().map(|ip| SocketAddr::new(ip, 0)).collect();
            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}

/// Sends one query and waits for the response carrying the same id.
async fn exchange(
    socket: &UdpSocket,
    domain: &str,
    name: &DnsName,
    rtype: RecordType,
    timeout: Duration,
) -> Result<Message, NetError> {
    let id: u16 = rand::random();
    let mut request = Message::new();
    request
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true);
    request.add_query(Query::query(name.clone(), rtype));

    let bytes = request
        .to_bytes()
        .map_err(|e| NetError::DnsProtocol(e.to_string()))?;
    socket.send(&bytes).await.dns_context(domain)?;

    let read = async {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let n = socket.recv(&mut buf).await?;
            match Message::from_bytes(&buf[..n]) {
                Ok(msg) if msg.id() == id && msg.message_type() == MessageType::Response => {
                    return Ok::<_, io::Error>(msg);
                }
                Ok(msg) => {
                    tracing::debug!(expected = id, got = msg.id(), "ignoring unrelated DNS message");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring malformed DNS message");
                }
            }
        }
    };

    tokio::time::timeout(timeout, read).await?.dns_context(domain)
}

/// Extracts A/AAAA answers. NXDOMAIN and empty answers are not errors here,
/// but an empty truncated answer is: the records did not fit in a datagram.
fn addresses(response: Message) -> Result<Vec<IpAddr>, NetError> {
    match response.response_code() {
        ResponseCode::NoError | ResponseCode::NXDomain => {}
        code => return Err(NetError::DnsProtocol(format!("server answered {:?}", code))),
    }
    if response.truncated() {
        if response.answers().is_empty() {
            return Err(NetError::DnsProtocol("truncated response".into()));
        }
        tracing::debug!(answers = response.answers().len(), "using partial truncated DNS response");
    }

    Ok(response
        .answers()
        .iter()
        .filter_map(|record| match record.data() {
            RData::A(a) => Some(IpAddr::V4(a.0)),
            RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        })
        .collect())
}
