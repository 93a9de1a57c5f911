//! Integration tests for the TCP transport.
//!
//! These spin up a real listener on an OS-assigned port and drive it
//! with both framed clients and raw sockets, so framing is checked
//! against arbitrary read/write boundaries.

use std::time::Duration;

use parley_transport::{Connection, TcpConnection, TcpTransport, Transport, TransportError};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

async fn bind() -> (TcpTransport, String) {
    let transport = TcpTransport::bind("127.0.0.1:0").await.expect("should bind");
    let addr = transport.local_addr().expect("local addr").to_string();
    (transport, addr)
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = (payload.len() as u32).to_le_bytes().to_vec();
    out.extend_from_slice(payload);
    out
}

#[tokio::test]
async fn test_tcp_accept_and_send_receive() {
    let (mut transport, addr) = bind().await;

    let server_handle =
        tokio::spawn(async move { transport.accept().await.expect("should accept") });

    let client = TcpConnection::connect(&addr).await.expect("client should connect");
    let server_conn = server_handle.await.expect("task should complete");

    assert!(server_conn.id().into_inner() > 0);
    assert_ne!(server_conn.id(), client.id());

    // --- Server sends, client receives ---
    server_conn.send(b"hello from server").await.expect("send should succeed");
    let received = client.recv().await.expect("recv").expect("frame");
    assert_eq!(&received[..], b"hello from server");

    // --- Client sends, server receives ---
    client.send(b"hello from client").await.expect("send should succeed");
    let received = server_conn.recv().await.expect("recv").expect("frame");
    assert_eq!(&received[..], b"hello from client");

    server_conn.close().await.expect("close should succeed");
}

#[tokio::test]
async fn test_recv_returns_none_on_client_close() {
    let (mut transport, addr) = bind().await;
    let server_handle = tokio::spawn(async move { transport.accept().await.unwrap() });

    let client = TcpConnection::connect(&addr).await.unwrap();
    let server_conn = server_handle.await.unwrap();

    client.close().await.unwrap();

    let result = server_conn.recv().await.expect("recv should not error");
    assert!(result.is_none(), "should return None on client close");
}

#[tokio::test]
async fn test_frames_survive_arbitrary_write_boundaries() {
    let (mut transport, addr) = bind().await;
    let server_handle = tokio::spawn(async move { transport.accept().await.unwrap() });

    let mut raw = TcpStream::connect(&addr).await.unwrap();
    let server_conn = server_handle.await.unwrap();

    // Two frames plus a zero-length frame, written in awkward slices:
    // half a prefix, then the rest of frame one glued to frame two.
    let mut wire = frame(b"first");
    wire.extend(frame(b""));
    wire.extend(frame(b"second"));

    raw.write_all(&wire[..2]).await.unwrap();
    raw.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    raw.write_all(&wire[2..]).await.unwrap();

    let one = server_conn.recv().await.unwrap().unwrap();
    let two = server_conn.recv().await.unwrap().unwrap();
    assert_eq!(&one[..], b"first");
    assert_eq!(&two[..], b"second");
}

#[tokio::test]
async fn test_peer_closing_mid_frame_ends_stream() {
    let (mut transport, addr) = bind().await;
    let server_handle = tokio::spawn(async move { transport.accept().await.unwrap() });

    let mut raw = TcpStream::connect(&addr).await.unwrap();
    let server_conn = server_handle.await.unwrap();

    raw.write_all(&50u32.to_le_bytes()).await.unwrap();
    raw.write_all(b"only part").await.unwrap();
    drop(raw);

    let result = server_conn.recv().await.expect("truncation is not an error");
    assert!(result.is_none());
}

#[tokio::test]
async fn test_oversized_frame_is_fatal() {
    let transport = TcpTransport::bind("127.0.0.1:0")
        .await
        .unwrap()
        .with_max_frame_len(16);
    let addr = transport.local_addr().unwrap().to_string();
    let mut transport = transport;
    let server_handle = tokio::spawn(async move { transport.accept().await.unwrap() });

    let mut raw = TcpStream::connect(&addr).await.unwrap();
    let server_conn = server_handle.await.unwrap();

    raw.write_all(&frame(&[b'x'; 64])).await.unwrap();

    let err = server_conn.recv().await.unwrap_err();
    assert!(matches!(err, TransportError::FrameTooLarge { len: 64, max: 16 }));
}
