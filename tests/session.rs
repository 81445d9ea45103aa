//! Connection behavior between a client and a server over an in-memory pipe:
//! heartbeats, fragmentation, the close handshake, limits, deadlines and
//! split halves.

mod harness;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use harness::{pair, pair_with};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;
use wsconn::{CloseCode, CloseFrame, Config, ConnectionState, Error, Message, Upgrader};

fn counter() -> (Arc<AtomicUsize>, impl FnMut() -> wsconn::Result<()> + Send + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let handle = Arc::clone(&count);
    (count, move || {
        handle.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

#[tokio::test]
async fn test_heartbeat_round_trip() {
    let (mut client, mut server) = pair(Config::default()).await;

    let (server_pings, on_ping) = counter();
    server.set_ping_handler(on_ping);

    // Each pong pushes the client's read deadline out.
    let deadlines = client.deadlines();
    let (client_pongs, mut on_pong) = counter();
    client.set_pong_handler(move || {
        deadlines.set_read(Some(Instant::now() + Duration::from_secs(60)));
        on_pong()
    });

    client.ping("PING").await.unwrap();
    client.send(Message::text("after ping")).await.unwrap();

    // The Ping is serviced inside recv and never surfaced.
    assert_eq!(server.recv().await.unwrap(), Message::text("after ping"));
    assert_eq!(server_pings.load(Ordering::SeqCst), 1);

    server.send(Message::text("reply")).await.unwrap();
    assert_eq!(client.recv().await.unwrap(), Message::text("reply"));
    assert_eq!(client_pongs.load(Ordering::SeqCst), 1);
    assert!(!client.ping_outstanding());
    assert!(client.deadlines().read().is_some());
}

#[tokio::test]
async fn test_unsolicited_pong_ignored() {
    let (mut client, mut server) = pair(Config::default()).await;
    let (pongs, on_pong) = counter();
    server.set_pong_handler(on_pong);

    client.send(Message::pong("unasked")).await.unwrap();
    client.send(Message::text("next")).await.unwrap();

    assert_eq!(server.recv().await.unwrap(), Message::text("next"));
    assert_eq!(pongs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fragmented_messages_reassembled() {
    let config = Config::default().with_fragment_size(5);
    let (mut client, mut server) = pair(config).await;

    let text = "fragmented across several frames";
    client.send(Message::text(text)).await.unwrap();
    client.send(Message::binary(vec![7u8; 12])).await.unwrap();

    assert_eq!(server.recv().await.unwrap(), Message::text(text));
    assert_eq!(server.recv().await.unwrap(), Message::binary(vec![7u8; 12]));
}

#[tokio::test]
async fn test_close_handshake_exactly_once() {
    let (mut client, mut server) = pair(Config::default()).await;

    client.close(CloseCode::GoingAway, "shutting down").await.unwrap();
    assert_eq!(client.state(), ConnectionState::Closed);

    assert_eq!(
        server.recv().await.unwrap(),
        Message::Close(Some(CloseFrame::new(CloseCode::GoingAway, "shutting down")))
    );
    assert_eq!(server.state(), ConnectionState::Closed);

    assert_eq!(server.recv().await, Err(Error::ConnectionClosed));
    assert_eq!(server.send(Message::text("late")).await, Err(Error::ConnectionClosed));
    assert_eq!(client.recv().await, Err(Error::ConnectionClosed));
    // Closing again is a no-op.
    client.close(CloseCode::Normal, "").await.unwrap();
}

#[tokio::test]
async fn test_close_echo_reaches_initiator_transport() {
    let (mut client, mut server) = pair(Config::default()).await;

    client.send(Message::close(CloseCode::Normal, "bye")).await.unwrap();
    assert!(server.recv().await.unwrap().is_close());

    // The echo is on the wire: Close, 1000, the peer's reason.
    let mut raw = client.into_inner();
    let mut echo = Vec::new();
    raw.read_to_end(&mut echo).await.unwrap();
    assert_eq!(echo, [0x88, 0x05, 0x03, 0xe8, b'b', b'y', b'e']);
}

#[tokio::test]
async fn test_read_limit_closes_with_too_big() {
    let (mut client, mut server) = pair(Config::default()).await;
    server.set_read_limit(1024);

    client.send(Message::binary(vec![0u8; 2048])).await.unwrap();
    let err = server.recv().await.unwrap_err();
    assert_eq!(err, Error::FrameTooLarge { size: 2048, max: 1024 });
    assert_eq!(err.close_code(), Some(CloseCode::MessageTooBig));
    assert!(!server.is_open());

    match client.recv().await.unwrap() {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::MessageTooBig),
        other => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_write_limit_sends_too_big_close() {
    let (mut client, mut server) = pair(Config::default().with_write_limit(16)).await;

    let err = client.send(Message::text("x".repeat(17))).await.unwrap_err();
    assert!(err.is_limit_exceeded());
    assert!(!client.is_open());

    match server.recv().await.unwrap() {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::MessageTooBig),
        other => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_reserved_bits_rejected_before_payload() {
    let (mut raw, server_io) = tokio::io::duplex(4096);
    let server = tokio::spawn(async move {
        let mut conn = Upgrader::new().accept(server_io).await.unwrap();
        let result = conn.recv().await;
        (result, conn.state())
    });

    raw.write_all(
        b"GET / HTTP/1.1\r\n\
          Host: example.com\r\n\
          Upgrade: websocket\r\n\
          Connection: Upgrade\r\n\
          Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
          Sec-WebSocket-Version: 13\r\n\r\n",
    )
    .await
    .unwrap();
    // FIN | RSV1 | Text, masked, declaring 72 bytes that never arrive.
    raw.write_all(&[0xC1, 0xC8, 0, 0, 0, 0]).await.unwrap();

    let (result, state) = server.await.unwrap();
    assert_eq!(result, Err(Error::ReservedBitsSet));
    assert_eq!(state, ConnectionState::Closed);

    let mut wire = Vec::new();
    raw.read_to_end(&mut wire).await.unwrap();
    let close_start = wire.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
    let close = &wire[close_start..];
    assert_eq!(close[0], 0x88);
    assert_eq!(u16::from_be_bytes([close[2], close[3]]), 1008);
}

#[tokio::test]
async fn test_invalid_utf8_closes_with_1007() {
    let (mut raw, server_io) = tokio::io::duplex(4096);
    let server = tokio::spawn(async move {
        let mut conn = Upgrader::new().accept(server_io).await.unwrap();
        conn.recv().await
    });

    raw.write_all(
        b"GET / HTTP/1.1\r\n\
          Host: example.com\r\n\
          Upgrade: websocket\r\n\
          Connection: Upgrade\r\n\
          Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
          Sec-WebSocket-Version: 13\r\n\r\n\
          \x81\x82\x00\x00\x00\x00\xc3\x28",
    )
    .await
    .unwrap();

    assert_eq!(server.await.unwrap(), Err(Error::InvalidUtf8));
    let mut wire = Vec::new();
    raw.read_to_end(&mut wire).await.unwrap();
    let close_start = wire.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
    assert_eq!(&wire[close_start + 2..close_start + 4], &1007u16.to_be_bytes());
}

#[tokio::test(start_paused = true)]
async fn test_read_deadline_expires() {
    let (mut client, mut server) = pair(Config::default()).await;

    server.set_read_deadline(Some(Instant::now() + Duration::from_secs(2)));
    let started = Instant::now();
    let err = server.recv().await.unwrap_err();
    assert!(err.is_timeout());
    assert!(started.elapsed() >= Duration::from_secs(2));

    // A read timeout does not end the connection.
    assert!(server.is_open());
    server.set_read_deadline(None);
    client.send(Message::text("late but fine")).await.unwrap();
    assert_eq!(server.recv().await.unwrap(), Message::text("late but fine"));
}

#[tokio::test(start_paused = true)]
async fn test_past_deadline_fails_without_waiting() {
    let (_client, mut server) = pair(Config::default()).await;
    let deadlines = server.deadlines();
    deadlines.set_read(Some(Instant::now() - Duration::from_millis(1)));

    let started = Instant::now();
    assert!(server.recv().await.unwrap_err().is_timeout());
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_expired_write_deadline_keeps_connection_open() {
    let (mut client, mut server) = pair(Config::default()).await;
    client.set_write_deadline(Some(Instant::now()));
    tokio::time::advance(Duration::from_millis(1)).await;

    // Nothing reached the wire, so the stream is still in sync.
    let err = client.send(Message::text("a")).await.unwrap_err();
    assert!(err.is_timeout());
    assert!(client.is_open());

    client.set_write_deadline(None);
    client.send(Message::text("b")).await.unwrap();
    assert_eq!(server.recv().await.unwrap(), Message::text("b"));
}

#[tokio::test(start_paused = true)]
async fn test_write_timeout_mid_frame_closes_connection() {
    // Tiny pipe that nobody drains.
    let (mut client, _server) = pair_with(Config::default(), 256).await;
    client.set_write_deadline(Some(Instant::now() + Duration::from_secs(1)));

    let err = client.send(Message::binary(vec![1u8; 4096])).await.unwrap_err();
    assert!(err.is_timeout());
    assert!(!client.is_open());
    assert_eq!(client.send(Message::text("after")).await, Err(Error::ConnectionClosed));
}

#[tokio::test(start_paused = true)]
async fn test_split_reader_kept_alive_by_heartbeat() {
    let (client, mut server) = pair(Config::default()).await;
    let (mut reader, writer) = client.split();

    // Pings go out every second; each pong pushes the read deadline 3s out.
    // Without the pongs the reader would time out long before "bye".
    let deadlines = reader.deadlines();
    deadlines.set_read(Some(Instant::now() + Duration::from_secs(3)));
    let (pongs, mut on_pong) = counter();
    reader.set_pong_handler(move || {
        deadlines.set_read(Some(Instant::now() + Duration::from_secs(3)));
        on_pong()
    });

    let peer = tokio::spawn(async move {
        loop {
            match server.recv().await {
                Ok(msg) if msg == Message::text("done") => {
                    server.send(Message::text("bye")).await.unwrap();
                }
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    let heartbeat = writer.clone();
    let pinger = tokio::spawn(async move {
        let mut ticks = tokio::time::interval(Duration::from_secs(1));
        ticks.tick().await;
        for _ in 0..5 {
            ticks.tick().await;
            heartbeat.ping("hb").await.unwrap();
        }
        heartbeat.send(Message::text("done")).await.unwrap();
    });

    let started = Instant::now();
    assert_eq!(reader.recv().await.unwrap(), Message::text("bye"));
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(pongs.load(Ordering::SeqCst), 5);
    pinger.await.unwrap();

    writer.close(CloseCode::Normal, "").await.unwrap();
    assert!(!reader.is_open());
    peer.await.unwrap();
}

#[tokio::test]
async fn test_split_writers_do_not_interleave_frames() {
    let config = Config::default().with_fragment_size(64);
    let (client, mut server) = pair(config).await;
    let (_reader, writer) = client.split();

    let senders: Vec<_> = (0..4u8)
        .map(|id| {
            let writer = writer.clone();
            tokio::spawn(async move {
                for _ in 0..10 {
                    writer.send(Message::binary(vec![id; 300])).await.unwrap();
                }
            })
        })
        .collect();

    let mut received = [0usize; 4];
    for _ in 0..40 {
        match server.recv().await.unwrap() {
            Message::Binary(data) => {
                assert_eq!(data.len(), 300);
                assert!(data.iter().all(|&b| b == data[0]));
                received[data[0] as usize] += 1;
            }
            other => panic!("expected binary, got {other:?}"),
        }
    }
    for sender in senders {
        sender.await.unwrap();
    }
    assert_eq!(received, [10; 4]);
}
