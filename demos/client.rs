//! WebSocket client: sends a few messages to the echo server, pings from a
//! second task through a split writer, and closes.
//!
//! Run the echo server first: cargo run --example echo_server
//! Then run: cargo run --example client [url]

use std::error::Error;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;
use wsconn::{CloseCode, Config, Dialer, Message};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("info,wsconn=debug"))
        .with_target(false)
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:9001/".to_string());

    let mut dialer = Dialer::new()
        .with_timeout(Duration::from_secs(10))
        .with_config(Config::client().with_fragment_size(16));
    let mut conn = dialer.dial(&url).await?;
    info!(%url, "connected");

    conn.set_pong_handler(|| {
        info!("pong received");
        Ok(())
    });
    conn.ping("are you there").await?;

    for text in ["Hello, WebSocket!", "a message long enough to be sent in fragments"] {
        conn.send(Message::text(text)).await?;
        match conn.recv().await? {
            Message::Text(reply) => info!(%reply, "received"),
            other => info!(?other, "received"),
        }
    }

    // Keep pinging from another task while this one waits for the last echo.
    let (mut reader, writer) = conn.split();
    let heartbeat = writer.clone();
    let pinger = tokio::spawn(async move {
        let mut ticks = tokio::time::interval(Duration::from_millis(200));
        for _ in 0..3 {
            ticks.tick().await;
            heartbeat.ping("tick").await?;
        }
        heartbeat.send(Message::text("last")).await
    });
    let reply = reader.recv().await?;
    info!(?reply, "received");
    pinger.await??;

    writer.close(CloseCode::Normal, "goodbye").await?;
    info!("closed");
    Ok(())
}
