//! Opening handshake over real sockets and in-memory pipes.

mod harness;

use std::time::Duration;

use harness::{TestServer, pair};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wsconn::{
    CloseCode, Config, Dialer, Error, HandshakeError, MaskRng, Message, Role, Upgrader,
    compute_accept_key,
};

#[test]
fn test_rfc_accept_vector() {
    assert_eq!(
        compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
        "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
    );
}

#[tokio::test]
async fn test_dial_and_echo() {
    let (server, addr) = TestServer::spawn().await;

    let mut conn = wsconn::dial(&TestServer::url(addr)).await.unwrap();
    assert_eq!(conn.role(), Role::Client);

    conn.send(Message::text("hello")).await.unwrap();
    assert_eq!(conn.recv().await.unwrap(), Message::text("hello"));

    conn.send(Message::binary(vec![0u8; 70_000])).await.unwrap();
    assert_eq!(conn.recv().await.unwrap(), Message::binary(vec![0u8; 70_000]));

    conn.close(CloseCode::Normal, "done").await.unwrap();
    assert!(!conn.is_open());
    server.shutdown().await;
}

#[tokio::test]
async fn test_dial_with_injected_random() {
    let (server, addr) = TestServer::spawn().await;

    let mut dialer = Dialer::new()
        .with_timeout(Duration::from_secs(5))
        .with_random(MaskRng::from_seed(42));
    let mut conn = dialer.dial(&TestServer::url(addr)).await.unwrap();
    conn.send(Message::text("seeded")).await.unwrap();
    assert_eq!(conn.recv().await.unwrap(), Message::text("seeded"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_dial_non_101_status() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0, "client hung up mid-request");
            head.extend_from_slice(&buf[..n]);
        }
        socket
            .write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n")
            .await
            .unwrap();
    });

    let err = wsconn::dial(&format!("ws://{addr}/")).await.unwrap_err();
    assert_eq!(err, Error::Handshake(HandshakeError::BadStatus(400)));
}

#[tokio::test]
async fn test_dial_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = wsconn::dial(&format!("ws://{addr}/")).await.unwrap_err();
    assert!(matches!(err, Error::Handshake(HandshakeError::Transport(_))));
}

#[tokio::test]
async fn test_origin_rejection_drops_client() {
    let upgrader = Upgrader::new().with_allowed_origins(["https://app.example"]);
    let (server, addr) = TestServer::spawn_with(upgrader).await;

    // The dialer sends no Origin header, so the upgrade is refused and the
    // socket closed without a response.
    let err = wsconn::dial(&TestServer::url(addr)).await.unwrap_err();
    assert!(matches!(err, Error::Handshake(HandshakeError::Transport(_))));

    server.shutdown().await;
}

#[tokio::test]
async fn test_upgrade_over_pipe() {
    let (mut client, mut server) = pair(Config::default()).await;
    assert_eq!(client.role(), Role::Client);
    assert_eq!(server.role(), Role::Server);

    client.send(Message::text("ping?")).await.unwrap();
    assert_eq!(server.recv().await.unwrap(), Message::text("ping?"));
    server.send(Message::text("pong!")).await.unwrap();
    assert_eq!(client.recv().await.unwrap(), Message::text("pong!"));
}

#[tokio::test]
async fn test_raw_request_negotiates_protocol() {
    let (mut raw, server_io) = tokio::io::duplex(4096);
    let upgrade = tokio::spawn(async move {
        Upgrader::new()
            .with_extension("x-test")
            .accept(server_io)
            .await
            .map(|_| ())
    });

    raw.write_all(
        b"GET /chat HTTP/1.1\r\n\
          Host: example.com\r\n\
          Upgrade: websocket\r\n\
          Connection: Upgrade\r\n\
          Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
          Sec-WebSocket-Protocol: chat, superchat\r\n\
          Sec-WebSocket-Version: 13\r\n\r\n",
    )
    .await
    .unwrap();

    upgrade.await.unwrap().unwrap();
    let mut response = vec![0u8; 4096];
    let n = raw.read(&mut response).await.unwrap();
    let response = String::from_utf8_lossy(&response[..n]);

    assert!(response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
    assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
    assert!(response.contains("Sec-WebSocket-Protocol: chat\r\n"));
    assert!(response.contains("Sec-WebSocket-Extensions: x-test\r\n"));
    assert!(response.ends_with("\r\n\r\n"));
}

#[tokio::test]
async fn test_wrong_version_rejected() {
    let (mut raw, server_io) = tokio::io::duplex(4096);
    raw.write_all(
        b"GET / HTTP/1.1\r\n\
          Host: example.com\r\n\
          Upgrade: websocket\r\n\
          Connection: Upgrade\r\n\
          Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
          Sec-WebSocket-Version: 8\r\n\r\n",
    )
    .await
    .unwrap();

    let err = Upgrader::new().accept(server_io).await.err();
    assert_eq!(err, Some(Error::Handshake(HandshakeError::WrongVersion)));
}
