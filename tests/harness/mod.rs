//! Shared fixtures for integration tests: an echo server on a real socket
//! and connected client/server pairs over in-memory pipes.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::DuplexStream;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;
use wsconn::{Config, Connection, MaskRng, Message, Upgrader, client_handshake};

/// Echo server on an ephemeral port. Every data message is sent back.
pub struct TestServer {
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> (Self, SocketAddr) {
        Self::spawn_with(Upgrader::new()).await
    }

    pub async fn spawn_with(upgrader: Upgrader) -> (Self, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let upgrader = Arc::new(upgrader);

        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let upgrader = Arc::clone(&upgrader);
                tokio::spawn(async move {
                    if let Ok(conn) = upgrader.accept(stream).await {
                        echo(conn).await;
                    }
                });
            }
        });

        (Self { handle }, addr)
    }

    pub fn url(addr: SocketAddr) -> String {
        format!("ws://{addr}/echo")
    }

    pub async fn shutdown(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

async fn echo<T>(mut conn: Connection<T>)
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    loop {
        match conn.recv().await {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(msg) => {
                if conn.send(msg).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Client and server connections joined by an in-memory pipe.
pub async fn pair(config: Config) -> (Connection<DuplexStream>, Connection<DuplexStream>) {
    pair_with(config, 64 * 1024).await
}

/// As [`pair`], with `capacity` bytes of buffering in each direction.
pub async fn pair_with(
    config: Config,
    capacity: usize,
) -> (Connection<DuplexStream>, Connection<DuplexStream>) {
    let (client_io, server_io) = tokio::io::duplex(capacity);
    let url = Url::parse("ws://pipe.test/").unwrap();
    let upgrader = Upgrader::new().with_config(config.clone());

    let client = async {
        let mut rng = MaskRng::from_seed(7);
        client_handshake(client_io, &url, config.clone(), &mut rng).await
    };
    let (client, server) = tokio::join!(client, upgrader.accept(server_io));
    (client.unwrap(), server.unwrap())
}
