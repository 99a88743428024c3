//! Integration tests for the TCP transport.
//!
//! These tests bind a real listener on a random loopback port and talk to
//! it with a plain `tokio::net::TcpStream`, so bytes really cross a socket.

use std::net::SocketAddr;

use metaserver_transport::{Connection, Transport, TcpTransport, connect};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn bind_random() -> (TcpTransport, SocketAddr) {
    let transport = TcpTransport::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("should have local addr");
    (transport, addr)
}

#[tokio::test]
async fn test_tcp_accept_and_send_receive() {
    let (mut transport, addr) = bind_random().await;

    let server_handle = tokio::spawn(async move {
        transport.accept().await.expect("should accept")
    });
    let mut client = TcpStream::connect(addr).await.expect("should connect");
    let server_conn = server_handle.await.expect("task should complete");

    assert!(server_conn.id().into_inner() > 0);
    assert_eq!(server_conn.peer_addr(), client.local_addr().unwrap());

    // Client → server.
    client.write_all(b"\x00\x08CLIENTS\x00").await.unwrap();
    let received = server_conn.recv().await.unwrap().unwrap();
    assert_eq!(received, b"\x00\x08CLIENTS\x00");

    // Server → client.
    server_conn.send(b"\x00\x05PING\x00").await.unwrap();
    let mut buf = [0u8; 7];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"\x00\x05PING\x00");
}

#[tokio::test]
async fn test_tcp_recv_returns_none_on_peer_close() {
    let (mut transport, addr) = bind_random().await;

    let server_handle = tokio::spawn(async move {
        transport.accept().await.expect("should accept")
    });
    let client = TcpStream::connect(addr).await.unwrap();
    let server_conn = server_handle.await.unwrap();

    drop(client);

    let result = server_conn.recv().await.expect("clean close is not an error");
    assert!(result.is_none(), "closed stream should yield None");
}

#[tokio::test]
async fn test_tcp_close_shuts_down_write_side() {
    let (mut transport, addr) = bind_random().await;

    let server_handle = tokio::spawn(async move {
        transport.accept().await.expect("should accept")
    });
    let mut client = TcpStream::connect(addr).await.unwrap();
    let server_conn = server_handle.await.unwrap();

    server_conn.send(b"bye").await.unwrap();
    server_conn.close().await.unwrap();

    // Everything written before close arrives, then EOF.
    let mut all = Vec::new();
    client.read_to_end(&mut all).await.unwrap();
    assert_eq!(all, b"bye");
}

#[tokio::test]
async fn test_tcp_connections_get_distinct_ids() {
    let (mut transport, addr) = bind_random().await;

    let server_handle = tokio::spawn(async move {
        let a = transport.accept().await.unwrap();
        let b = transport.accept().await.unwrap();
        (a, b)
    });
    let _c1 = TcpStream::connect(addr).await.unwrap();
    let _c2 = TcpStream::connect(addr).await.unwrap();
    let (a, b) = server_handle.await.unwrap();

    assert_ne!(a.id(), b.id());
}

#[tokio::test]
async fn test_connect_reaches_listener() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let accept = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 3];
        stream.read_exact(&mut buf).await.unwrap();
        stream.write_all(&buf).await.unwrap();
    });

    let conn = connect(addr).await.expect("should connect");
    assert_eq!(conn.peer_addr(), addr);
    conn.send(b"\x00\x03\x40").await.unwrap();
    let echoed = conn.recv().await.unwrap().unwrap();
    assert_eq!(echoed, b"\x00\x03\x40");
    accept.await.unwrap();
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    // Bind then drop to get a port nobody is listening on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = connect(addr).await;
    assert!(result.is_err(), "connecting to a closed port should fail");
}
