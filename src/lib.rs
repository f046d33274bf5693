//! # agentnet
//!
//! Name resolution and connection establishment for a host telemetry agent.
//!
//! Agents run on hosts with broken resolv.conf, IPv6-only networks and
//! operator-supplied nameservers. `agentnet` keeps the outbound path working
//! in those environments:
//!
//! - **Custom nameserver**: an operator override, tried first, with a fixed
//!   list of public resolvers behind it
//! - **Family preference**: IPv4 first when the host has usable IPv4, IPv6
//!   first otherwise, decided once per process
//! - **Sequential dialing**: resolved candidates are tried one at a time
//!   until one connects
//! - **HTTP client**: pooled HTTP/1.1 over the same dial path, with optional
//!   environment proxies and BoringSSL TLS
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     agentnet::set_custom_dns_server("10.0.0.53");
//!
//!     let client = agentnet::build_http_client(Duration::from_secs(10))?;
//!     let resp = client.get("https://collector.example.com/api/v1/ping").await?;
//!     println!("Status: {}", resp.status());
//!
//!     let dial = agentnet::build_dial_context(Duration::ZERO);
//!     let stream = dial.dial("tcp", "collector.example.com:9000").await?;
//!     println!("Connected to {}", stream.peer_addr()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error type and IO error context
//! - [`dns`] - Resolvers, nameserver fallback, family preference
//! - [`socket`] - Sequential connects, dialers, proxy tunnels, TLS
//! - [`client`] - Pooled HTTP client
//! - [`context`] - Process-wide override and the factory functions

pub mod base;
pub mod client;
pub mod context;
pub mod dns;
pub mod socket;

pub use base::neterror::NetError;
pub use client::{HttpClient, HttpClientConfig};
pub use context::{
    build_dial_context, build_dialer, build_http_client, build_resolver_capability,
    set_custom_dns_server, NetContext,
};
pub use dns::Resolver;
pub use socket::{DialContext, Dialer};
