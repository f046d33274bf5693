//! Process-wide context tests.
//!
//! The global context is shared by every test in this binary, so the whole
//! lifecycle is exercised in a single test.

use agentnet::context::NetContext;
use agentnet::{
    build_dial_context, build_dialer, build_http_client, build_resolver_capability,
    set_custom_dns_server,
};
use std::time::Duration;

#[tokio::test]
async fn test_global_override_lifecycle() {
    assert!(build_resolver_capability().is_system());
    assert!(NetContext::global().custom_dns_server().is_none());

    set_custom_dns_server("");
    assert!(build_resolver_capability().is_system());

    set_custom_dns_server("dns.internal.test");
    set_custom_dns_server("9.9.9.9");
    assert_eq!(
        NetContext::global().custom_dns_server(),
        Some("dns.internal.test:53")
    );

    let resolver = build_resolver_capability();
    assert_eq!(resolver.nameserver(), Some("dns.internal.test:53"));
    assert_eq!(
        build_dialer(Duration::ZERO).resolver().nameserver(),
        Some("dns.internal.test:53")
    );
    assert_eq!(
        build_dial_context(Duration::ZERO).resolver().nameserver(),
        Some("dns.internal.test:53")
    );

    let client = build_http_client(Duration::ZERO).unwrap();
    assert_eq!(client.timeout(), Duration::from_secs(30));
}
