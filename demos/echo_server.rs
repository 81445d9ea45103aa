//! WebSocket echo server with heartbeat-driven read deadlines.
//!
//! Run with: cargo run --example echo_server
//! Then connect with: cargo run --example client

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wsconn::{Config, Message, Upgrader};

const ADDR: &str = "127.0.0.1:9001";
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("info,wsconn=debug"))
        .with_target(false)
        .init();

    let upgrader = Arc::new(
        Upgrader::new().with_config(Config::server().with_read_limit(1024 * 1024)),
    );
    let listener = TcpListener::bind(ADDR).await?;
    info!("echo server listening on ws://{ADDR}");

    loop {
        let (stream, addr) = listener.accept().await?;
        let upgrader = Arc::clone(&upgrader);
        tokio::spawn(async move {
            if let Err(err) = handle_connection(&upgrader, stream).await {
                warn!(%addr, error = %err, "connection ended with error");
            }
        });
    }
}

async fn handle_connection(upgrader: &Upgrader, stream: TcpStream) -> wsconn::Result<()> {
    let mut conn = upgrader.accept(stream).await?;

    // Any ping from the client keeps the connection alive for another minute.
    let deadlines = conn.deadlines();
    deadlines.set_read(Some(Instant::now() + IDLE_TIMEOUT));
    conn.set_ping_handler(move || {
        deadlines.set_read(Some(Instant::now() + IDLE_TIMEOUT));
        Ok(())
    });

    loop {
        match conn.recv().await? {
            Message::Close(frame) => {
                info!(?frame, "client closed");
                return Ok(());
            }
            msg => {
                info!(len = msg.payload_len(), "echoing");
                conn.send(msg).await?;
            }
        }
    }
}
