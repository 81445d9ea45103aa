//! Established connections and their control loop.
//!
//! A [`Connection`] owns the frame reader and writer, reassembles
//! fragmented messages, answers heartbeats and runs the close handshake.
//! [`Connection::split`] hands out a [`ConnectionReader`] and a cloneable
//! [`ConnectionWriter`] for full-duplex use from separate tasks; the
//! reader's Pongs and Close echoes are written through the same writer.
//!
//! ## Connection Lifecycle
//!
//! 1. **Open** - after a successful `dial` or `upgrade`
//! 2. **Closed** - a Close was sent or received, or a violation ended the
//!    connection. Every later read or write fails with `ConnectionClosed`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use wsconn::{CloseCode, Config, Connection, Message, Role};
//!
//! // `stream` has already completed the opening handshake.
//! let mut conn = Connection::new(stream, Role::Client, Config::client());
//!
//! conn.send(Message::text("Hello")).await?;
//! match conn.recv().await? {
//!     Message::Close(_) => {}
//!     msg => println!("Received: {msg:?}"),
//! }
//!
//! // Drive both directions at once.
//! let (mut reader, writer) = conn.split();
//! let ticker = writer.clone();
//! tokio::spawn(async move { ticker.send(Message::text("tick")).await });
//! let msg = reader.recv().await?;
//! writer.close(CloseCode::Normal, "done").await?;
//! ```

mod fragmenter;
mod role;
mod state;

pub use fragmenter::MessageFragmenter;
pub use role::Role;
pub use state::ConnectionState;

#[cfg(feature = "async-tokio")]
#[allow(clippy::module_inception)]
mod connection;

#[cfg(feature = "async-tokio")]
mod reader;
#[cfg(feature = "async-tokio")]
mod writer;

#[cfg(feature = "async-tokio")]
pub use connection::Connection;
#[cfg(feature = "async-tokio")]
pub use reader::{ConnectionReader, Handler};
#[cfg(feature = "async-tokio")]
pub use writer::ConnectionWriter;
