//! Timed connect tests on loopback.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use tokio::net::{TcpListener, TcpSocket, TcpStream};

use socks4_connect::{
    timed_connect, AddressFamily, ConnectRequest, ConnectState, Error, ErrorKind, Phase, Socket,
    StaticResolver, TimedConnect,
};

#[tokio::test]
async fn test_connect_to_listener() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accept_handle = tokio::spawn(async move { listener.accept().await.ok() });

    let mut socket = Socket::new();
    let result = timed_connect(&mut socket, "127.0.0.1", addr.port(), 5, AddressFamily::Any).await;

    assert!(result.is_ok(), "connect failed: {:?}", result.err());
    assert!(socket.is_open());
    assert_eq!(socket.remote_endpoint().unwrap(), addr);

    accept_handle.await.ok();
}

#[tokio::test]
async fn test_connect_by_name_with_family_filter() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accept_handle = tokio::spawn(async move { listener.accept().await.ok() });

    let resolver = StaticResolver::new().with_mapping(
        "dual.example",
        [
            "::1".parse::<IpAddr>().unwrap(),
            "127.0.0.1".parse::<IpAddr>().unwrap(),
        ],
    );
    let request = ConnectRequest::new("dual.example", addr.port(), 5)
        .with_family(AddressFamily::V4Only);

    let mut socket = Socket::new();
    let op = TimedConnect::with_resolver(&mut socket, request, resolver);
    assert_eq!(op.state(), ConnectState::Start);
    op.run().await.unwrap();

    assert_eq!(socket.remote_endpoint().unwrap(), addr);
    accept_handle.await.ok();
}

#[tokio::test]
async fn test_v6_filter_on_v4_only_host() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut socket = Socket::new();
    let err = timed_connect(&mut socket, "127.0.0.1", port, 5, AddressFamily::V6Only)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NoMatchingAddressFamily);
    assert!(!socket.is_open());

    let resolver = StaticResolver::new()
        .with_mapping("v4.example", ["127.0.0.1".parse::<IpAddr>().unwrap()]);
    let request = ConnectRequest::new("v4.example", port, 5).with_family(AddressFamily::V6Only);
    let err = TimedConnect::with_resolver(&mut socket, request, resolver)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::NoMatchingAddressFamily {
            family: AddressFamily::V6Only,
            ..
        }
    ));
    assert!(!socket.is_open());
}

#[tokio::test]
async fn test_failed_connect_closes_previous_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accept_handle = tokio::spawn(async move { listener.accept().await.ok() });

    let mut socket = Socket::new();
    socket.connect(&[addr]).await.unwrap();
    assert!(socket.is_open());

    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_port = dead.local_addr().unwrap().port();
    drop(dead);

    let err = timed_connect(&mut socket, "127.0.0.1", dead_port, 5, AddressFamily::Any)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(!socket.is_open());

    accept_handle.await.ok();
}

#[tokio::test]
async fn test_unbounded_timeout_connects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accept_handle = tokio::spawn(async move { listener.accept().await.ok() });

    let mut socket = Socket::new();
    let result = timed_connect(&mut socket, "127.0.0.1", addr.port(), u64::MAX, AddressFamily::Any)
        .await;

    assert!(result.is_ok(), "connect failed: {:?}", result.err());
    assert!(socket.is_open());
    accept_handle.await.ok();
}

// A listener with a zero backlog and one queued connection drops further
// SYNs on Linux, so the next connect hangs until the deadline.
#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_unanswered_connect_times_out() {
    let listener_socket = TcpSocket::new_v4().unwrap();
    listener_socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let listener = listener_socket.listen(0).unwrap();
    let addr = listener.local_addr().unwrap();
    let _filler = TcpStream::connect(addr).await.unwrap();

    let mut socket = Socket::new();
    let start = Instant::now();
    let err = timed_connect(&mut socket, "127.0.0.1", addr.port(), 1, AddressFamily::Any)
        .await
        .unwrap_err();
    let elapsed = start.elapsed();

    assert!(
        matches!(
            err,
            Error::TimedOut {
                phase: Phase::Connect,
                ..
            }
        ),
        "got {:?}",
        err
    );
    assert!(err.is_retryable());
    assert!(elapsed >= Duration::from_secs(1), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "elapsed {:?}", elapsed);
    assert!(!socket.is_open());

    drop(listener);
}
