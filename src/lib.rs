//! # wsconn - RFC 6455 WebSocket engine for tokio streams
//!
//! `wsconn` turns a byte stream into a framed, message-oriented, full-duplex
//! WebSocket connection.
//!
//! ## Features
//!
//! - **Client and server handshakes**: [`Dialer`] for `ws://` URLs and
//!   [`Upgrader`] for requests handed over by any HTTP layer
//! - **Incremental frame codec** rejecting reserved bits, wrong masking and
//!   oversized frames before their payload is read
//! - **Control loop** that reassembles fragments, answers Pings and runs the
//!   close handshake
//! - **Split halves** so one task can block in `recv` while others send
//! - **Deadlines and limits** for every read and write
//! - **Injectable randomness** for nonces and mask keys
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wsconn::{CloseCode, Message, Upgrader};
//!
//! // Server
//! let upgrader = Upgrader::new();
//! let (stream, _) = listener.accept().await?;
//! let mut conn = upgrader.accept(stream).await?;
//! while let Ok(msg) = conn.recv().await {
//!     match msg {
//!         Message::Close(_) => break,
//!         msg => conn.send(msg).await?,
//!     }
//! }
//!
//! // Client
//! let mut conn = wsconn::dial("ws://127.0.0.1:9001/").await?;
//! conn.send(Message::text("Hello")).await?;
//! conn.close(CloseCode::Normal, "done").await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;
pub mod random;

#[cfg(feature = "async-tokio")]
pub mod client;
#[cfg(feature = "async-tokio")]
pub mod codec;
#[cfg(feature = "async-tokio")]
pub mod server;

pub use config::{Config, Limits};
pub use connection::{ConnectionState, Role};
pub use error::{Error, HandshakeError, Result};
pub use message::{CloseCode, CloseFrame, Message};
pub use protocol::{HandshakeRequest, HandshakeResponse, OpCode, WS_GUID, compute_accept_key};
pub use random::{MaskRng, OsRandom, RandomSource};

#[cfg(feature = "async-tokio")]
pub use client::{Dialer, client_handshake, dial};
#[cfg(feature = "async-tokio")]
pub use codec::{DeadlineHandle, FrameReader, FrameWriter};
#[cfg(feature = "async-tokio")]
pub use connection::{Connection, ConnectionReader, ConnectionWriter, Handler};
#[cfg(feature = "async-tokio")]
pub use server::{HttpExchange, RawHttpExchange, Upgrader};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn test_public_types_are_send() {
        assert_send::<Error>();
        assert_send::<HandshakeError>();
        assert_send::<Config>();
        assert_send::<Limits>();
        assert_send::<Message>();
        assert_send::<CloseCode>();
        assert_send::<CloseFrame>();
        assert_send::<ConnectionState>();
        assert_send::<Role>();
        assert_send::<MaskRng>();
    }

    #[test]
    fn test_public_types_are_sync() {
        assert_sync::<Error>();
        assert_sync::<Config>();
        assert_sync::<Limits>();
        assert_sync::<Message>();
        assert_sync::<CloseCode>();
        assert_sync::<CloseFrame>();
        assert_sync::<ConnectionState>();
        assert_sync::<Role>();
    }

    #[cfg(feature = "async-tokio")]
    #[test]
    fn test_connection_is_send() {
        assert_send::<Connection<tokio::net::TcpStream>>();
        assert_send::<Dialer>();
        assert_send::<ConnectionReader<tokio::net::TcpStream>>();
        assert_send::<ConnectionWriter<tokio::net::TcpStream>>();
        assert_sync::<ConnectionWriter<tokio::net::TcpStream>>();
        assert_send::<DeadlineHandle>();
        assert_sync::<Upgrader>();
    }
}
