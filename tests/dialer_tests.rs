//! End-to-end dialer tests: connect to a fake proxy, handshake, use the tunnel.

use std::net::IpAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use socks4_connect::socks4::proto::Socks4Request;
use socks4_connect::{DialerOptions, Error, ErrorKind, Socks4Dialer, StaticResolver};

/// A proxy that grants every request and then echoes bytes back.
async fn echo_proxy() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut raw = vec![0u8; 8];
        stream.read_exact(&mut raw).await.unwrap();
        loop {
            let b = stream.read_u8().await.unwrap();
            raw.push(b);
            if b == 0 {
                break;
            }
        }
        let request = Socks4Request::decode(&raw).unwrap();
        assert_eq!(request.user_id, b"moose");

        stream
            .write_all(&[0x00, 0x5A, 0, 0, 0, 0, 0, 0])
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        loop {
            let n = stream.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            stream.write_all(&buf[..n]).await.unwrap();
        }
    });

    port
}

#[tokio::test]
async fn test_dial_through_proxy() {
    let port = echo_proxy().await;
    let options = DialerOptions {
        user_id: "moose".to_string(),
        connect_timeout_secs: 5,
        handshake_timeout_secs: 5,
        ..Default::default()
    };
    let dialer = Socks4Dialer::with_options("proxy.test", port, options).unwrap();
    let resolver = StaticResolver::new()
        .with_mapping("proxy.test", ["127.0.0.1".parse::<IpAddr>().unwrap()])
        .with_mapping("target.test", ["192.0.2.1".parse::<IpAddr>().unwrap()]);

    let mut socket = dialer
        .dial_with(&resolver, "target.test", 80)
        .await
        .unwrap();
    assert!(socket.is_open());

    // the socket is the tunnel now
    socket.write_all(b"hello").await.unwrap();
    let mut buf = [0u8; 5];
    socket.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"hello");
}

#[tokio::test]
async fn test_dial_unreachable_proxy() {
    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = dead.local_addr().unwrap().port();
    drop(dead);

    let dialer = Socks4Dialer::new("127.0.0.1", port);
    let err = dialer.dial("127.0.0.1", 80).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_dial_silent_proxy_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let options = DialerOptions {
        handshake_timeout_secs: 1,
        ..Default::default()
    };
    let dialer = Socks4Dialer::with_options("127.0.0.1", port, options).unwrap();
    let err = dialer.dial("127.0.0.1", 80).await.unwrap_err();
    assert!(matches!(err, Error::TimedOut { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_dial_with_unbounded_timeouts_from_json() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut header = [0u8; 8];
        stream.read_exact(&mut header).await.unwrap();
        while stream.read_u8().await.unwrap() != 0 {}
        stream
            .write_all(&[0x00, 0x5A, 0, 0, 0, 0, 0, 0])
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let options: DialerOptions = serde_json::from_str(&format!(
        r#"{{"connect_timeout_secs": {max}, "handshake_timeout_secs": {max}}}"#,
        max = u64::MAX
    ))
    .unwrap();
    let dialer = Socks4Dialer::with_options("127.0.0.1", port, options).unwrap();

    let socket = dialer.dial("127.0.0.1", 80).await.unwrap();
    assert!(socket.is_open());
}
