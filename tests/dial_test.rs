//! Dialer Tests
//!
//! End-to-end dials through a `NetContext` whose override points at a
//! loopback nameserver:
//! - Family preference ordering with fallback to the other family
//! - Network selectors and aggregate failures
//! - Timeouts and cancellation against a silent nameserver

mod common;

use agentnet::dns::FamilyPreference;
use agentnet::{NetContext, NetError};
use common::FakeNameserver;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn context(nameserver: &FakeNameserver, prefer_ipv4: bool) -> NetContext {
    let ctx = NetContext::with_preference(Arc::new(FamilyPreference::fixed(prefer_ipv4)));
    ctx.set_custom_dns_server(&nameserver.addr.to_string());
    ctx
}

async fn dual_stack_zone() -> FakeNameserver {
    FakeNameserver::start(&[("collector.test", &[ip("::1"), ip("127.0.0.1")])]).await
}

#[tokio::test]
async fn test_ipv4_preferred_connects_over_ipv4() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let ctx = context(&dual_stack_zone().await, true);

    let stream = ctx
        .dial_context(Duration::from_secs(5))
        .dial("tcp", &format!("collector.test:{}", addr.port()))
        .await
        .unwrap();
    assert_eq!(stream.peer_addr().unwrap(), addr);
}

#[tokio::test]
async fn test_ipv6_preferred_falls_back_to_ipv4() {
    // Nothing listens on [::1] at this port, so the first candidate fails.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let ctx = context(&dual_stack_zone().await, false);

    let stream = ctx
        .dial_context(Duration::from_secs(5))
        .dial("tcp", &format!("collector.test:{}", addr.port()))
        .await
        .unwrap();
    assert_eq!(stream.peer_addr().unwrap(), addr);
}

#[tokio::test]
async fn test_tcp6_without_ipv6_candidates_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = FakeNameserver::start(&[("v4only.test", &[ip("127.0.0.1")])]).await;
    let ctx = context(&server, true);

    let err = ctx
        .dial_context(Duration::from_secs(2))
        .dial("tcp6", &format!("v4only.test:{}", port))
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::DialFailed { .. }), "got {err}");
}

#[tokio::test]
async fn test_all_candidates_refused() {
    let port = common::closed_port().await;
    let server = FakeNameserver::start(&[("collector.test", &[ip("127.0.0.1")])]).await;
    let ctx = context(&server, true);

    let err = ctx
        .dial_context(Duration::from_secs(2))
        .dial("tcp", &format!("collector.test:{}", port))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("failed to dial to any resolved address of collector.test:{}", port)
    );
}

#[tokio::test]
async fn test_unknown_name_is_resolution_failure() {
    let server = FakeNameserver::start(&[]).await;
    let ctx = context(&server, true);

    let err = ctx
        .dial_context(Duration::from_secs(2))
        .dial("tcp", "missing.test:443")
        .await
        .unwrap_err();
    assert!(err.is_resolution_failure(), "got {err}");
}

#[tokio::test]
async fn test_plain_dialer_uses_override() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = FakeNameserver::start(&[("collector.test", &[ip("127.0.0.1")])]).await;
    let ctx = context(&server, true);

    let stream = ctx
        .dialer(Duration::from_secs(2))
        .dial("tcp", &format!("collector.test:{}", addr.port()))
        .await
        .unwrap();
    assert_eq!(stream.peer_addr().unwrap(), addr);
    assert!(server.queries() > 0);
}

#[tokio::test]
async fn test_silent_nameserver_bounded_by_timeout() {
    let silent = common::silent_nameserver().await;
    let ctx = NetContext::with_preference(Arc::new(FamilyPreference::fixed(true)));
    ctx.set_custom_dns_server(&silent.to_string());

    let started = Instant::now();
    let err = ctx
        .dial_context(Duration::from_millis(300))
        .dial("tcp", "collector.test:443")
        .await
        .unwrap_err();

    assert!(matches!(err, NetError::TimedOut), "got {err}");
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_dropping_dial_cancels_promptly() {
    let silent = common::silent_nameserver().await;
    let ctx = NetContext::with_preference(Arc::new(FamilyPreference::fixed(true)));
    ctx.set_custom_dns_server(&silent.to_string());
    let dial = ctx.dial_context(Duration::from_secs(60));

    let started = Instant::now();
    let outcome = tokio::time::timeout(
        Duration::from_millis(200),
        dial.dial("tcp", "collector.test:443"),
    )
    .await;

    assert!(outcome.is_err(), "dial should still be pending");
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_malformed_address() {
    let ctx = NetContext::with_preference(Arc::new(FamilyPreference::fixed(true)));
    let err = ctx
        .dial_context(Duration::ZERO)
        .dial("tcp", "collector.test")
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::InvalidAddress { .. }));
}
