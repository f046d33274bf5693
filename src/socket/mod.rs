//! Connection establishment.
//!
//! - [`connectjob`]: sequential TCP connects over ordered candidates
//! - [`dialer`]: raw stream dialers with lookup and family ordering
//! - [`proxy`]: environment proxies and CONNECT tunnels
//! - [`tls`]: BoringSSL client configuration
//! - [`stream`]: the plain-or-TLS stream handed to the HTTP client

pub mod connectjob;
pub mod dialer;
pub mod matcher;
pub mod proxy;
pub mod stream;
pub mod tls;

pub use connectjob::{ConnectJob, Network};
pub use dialer::{DialContext, Dialer};
