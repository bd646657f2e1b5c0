//! Loopback tests for `TcpTransport` against a plain std listener.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::time::{Duration, Instant};

use rookery_transport::{Transport, TcpTransport, TransportError, send_all};

fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Polls `recv` until `want` bytes arrived or a second passes.
fn recv_exact(transport: &mut TcpTransport, want: usize) -> Vec<u8> {
    let deadline = Instant::now() + Duration::from_secs(1);
    let mut out = Vec::new();
    let mut buf = [0u8; 64];
    while out.len() < want && Instant::now() < deadline {
        let n = transport.recv(&mut buf).unwrap();
        out.extend_from_slice(&buf[..n]);
        if n == 0 {
            std::thread::sleep(Duration::from_millis(5));
        }
    }
    out
}

#[test]
fn test_send_all_bytes_reach_peer() {
    let (listener, port) = listener();
    let mut transport = TcpTransport::new();
    transport.connect("127.0.0.1", port).unwrap();
    let (mut peer, _) = listener.accept().unwrap();

    send_all(&mut transport, &[0x04, 0x00, 0x02, b'o', b'k']).unwrap();
    transport.update().unwrap();

    let mut got = [0u8; 5];
    peer.set_read_timeout(Some(Duration::from_secs(1))).unwrap();
    peer.read_exact(&mut got).unwrap();
    assert_eq!(got, [0x04, 0x00, 0x02, b'o', b'k']);
}

#[test]
fn test_recv_nothing_available_returns_zero() {
    let (listener, port) = listener();
    let mut transport = TcpTransport::new();
    transport.connect("127.0.0.1", port).unwrap();
    let _peer = listener.accept().unwrap();

    let mut buf = [0u8; 16];
    assert_eq!(transport.recv(&mut buf).unwrap(), 0);
}

#[test]
fn test_recv_peer_bytes_arrive() {
    let (listener, port) = listener();
    let mut transport = TcpTransport::new();
    transport.connect("127.0.0.1", port).unwrap();
    let (mut peer, _) = listener.accept().unwrap();

    peer.write_all(&[0x03, 0x05, 0x00, 0x2a]).unwrap();
    assert_eq!(recv_exact(&mut transport, 4), vec![0x03, 0x05, 0x00, 0x2a]);
}

#[test]
fn test_recv_peer_closed_returns_connection_closed() {
    let (listener, port) = listener();
    let mut transport = TcpTransport::new();
    transport.connect("127.0.0.1", port).unwrap();
    let (peer, _) = listener.accept().unwrap();
    drop(peer);

    let deadline = Instant::now() + Duration::from_secs(1);
    let mut buf = [0u8; 4];
    loop {
        match transport.recv(&mut buf) {
            Ok(0) if Instant::now() < deadline => std::thread::sleep(Duration::from_millis(5)),
            Err(TransportError::ConnectionClosed(_)) => break,
            other => panic!("expected ConnectionClosed, got {other:?}"),
        }
    }
}

#[test]
fn test_send_before_connect_returns_not_connected() {
    let mut transport = TcpTransport::new();
    assert!(matches!(
        transport.send(b"x"),
        Err(TransportError::NotConnected)
    ));
}

#[test]
fn test_send_full_queue_accepts_zero() {
    let (listener, port) = listener();
    let mut transport = TcpTransport::with_max_pending(0);
    transport.connect("127.0.0.1", port).unwrap();
    let _peer = listener.accept().unwrap();

    assert_eq!(transport.send(b"abc").unwrap(), 0);
    assert!(matches!(
        send_all(&mut transport, b"abc"),
        Err(TransportError::WriteStalled { remaining: 3 })
    ));
}

#[test]
fn test_connect_refused_returns_connect_failed() {
    // Bind then drop to get a port that is almost certainly closed.
    let (listener, port) = listener();
    drop(listener);

    let mut transport = TcpTransport::new();
    let err = transport.connect("127.0.0.1", port).unwrap_err();
    assert!(matches!(err, TransportError::ConnectFailed { .. }));
}
