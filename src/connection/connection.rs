use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::reader::{ConnectionReader, ReadSide};
use super::writer::{ConnectionWriter, Shared, WriteSide};
use crate::codec::{DeadlineHandle, FrameReader, FrameWriter};
use crate::config::Config;
use crate::connection::{ConnectionState, Role};
use crate::error::Result;
use crate::message::{CloseCode, Message};
use crate::random::{MaskRng, RandomSource};

/// An established WebSocket connection over `T`.
///
/// `recv` services heartbeats and the close handshake internally and only
/// returns data messages, plus the peer's Close exactly once. Protocol and
/// limit violations close the connection with the matching status code.
///
/// To read and write from different tasks, [`split`](Self::split) it.
///
/// ## Example
///
/// ```rust,ignore
/// use wsconn::{dial, CloseCode, Message};
///
/// let mut conn = dial("ws://localhost:8080/echo").await?;
/// conn.send(Message::text("Hello")).await?;
/// let reply = conn.recv().await?;
/// conn.close(CloseCode::Normal, "done").await?;
/// ```
pub struct Connection<T> {
    read: ReadSide<T>,
    write: Mutex<WriteSide<T>>,
    shared: Arc<Shared>,
    deadlines: DeadlineHandle,
}

impl<T: AsyncRead + AsyncWrite> Connection<T> {
    /// Wrap a stream on which the handshake has already completed.
    pub fn new(io: T, role: Role, config: Config) -> Self {
        Self::from_parts(io, role, config, BytesMut::new(), Box::new(MaskRng::new()))
    }

    /// Wrap a stream, decoding `leftover` (bytes read past the handshake)
    /// first and drawing mask keys from `random`.
    pub fn from_parts(
        io: T,
        role: Role,
        config: Config,
        leftover: BytesMut,
        random: Box<dyn RandomSource>,
    ) -> Self {
        let (read_half, write_half) = tokio::io::split(io);
        let deadlines = DeadlineHandle::new();
        let shared = Arc::new(Shared::new(role, config.write_limit));

        let frames = FrameReader::new(read_half, role, &config, leftover, deadlines.clone());
        let read = ReadSide::new(frames, &config, Arc::clone(&shared));
        let frames = FrameWriter::new(write_half, role, &config, random, deadlines.clone());
        let write = WriteSide::new(frames, &config, Arc::clone(&shared));

        Self {
            read,
            write: Mutex::new(write),
            shared,
            deadlines,
        }
    }

    /// Receive the next data message, or the peer's Close.
    ///
    /// Pings are answered with a Pong echoing their payload, then the ping
    /// handler runs. A Pong is passed to the pong handler only if a Ping of
    /// ours is outstanding; otherwise it is dropped. A Close is echoed with
    /// status 1000 and the peer's reason, the transport is shut down, and
    /// `Message::Close` is returned.
    ///
    /// ## Errors
    ///
    /// - `Error::ConnectionClosed` once the connection is closed
    /// - protocol and limit violations; the connection is closed with the
    ///   code from [`Error::close_code`](crate::Error::close_code)
    /// - `Error::UnknownOpcode`; the frame is skipped and the connection stays open
    /// - handler errors, as returned by the handler
    /// - `Error::Io` on transport failure or an expired read deadline
    pub async fn recv(&mut self) -> Result<Message> {
        self.read.recv(&self.write).await
    }

    /// Send a message.
    ///
    /// Text and Binary are split into `Config::fragment_size` frames if one is
    /// set. Sending a Ping marks it outstanding. Sending a Close closes the
    /// connection.
    ///
    /// ## Errors
    ///
    /// - `Error::ConnectionClosed` if the connection is closed
    /// - `Error::MessageTooLarge` if the payload exceeds the write limit;
    ///   nothing of the message is written, a Close 1009 is sent instead and
    ///   the connection is closed
    /// - `Error::ControlFrameTooLarge` for a Ping, Pong or Close over 125 bytes
    /// - `Error::Io` on transport failure or an expired write deadline. The
    ///   connection stays open if the deadline expired before any byte of
    ///   the message was written, and is closed otherwise.
    pub async fn send(&mut self, message: Message) -> Result<()> {
        self.write.get_mut().send(message).await
    }

    /// Send a Ping carrying `data`.
    pub async fn ping(&mut self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send(Message::Ping(data.into())).await
    }

    /// Send a Close with `code` and `reason`, then shut the transport down.
    ///
    /// Closing an already closed connection is a no-op.
    ///
    /// ## Errors
    ///
    /// - `Error::InvalidCloseCode` for codes that may not be sent, such as
    ///   1004-1006 and 1015
    /// - `Error::ControlFrameTooLarge` if `reason` exceeds 123 bytes
    /// - `Error::Io` if the Close cannot be written; the connection is closed regardless
    pub async fn close(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        self.write.get_mut().close(code, reason).await
    }

    /// Split into a reader and a writer that can be driven from different
    /// tasks. Both keep the handlers, limits and deadlines set so far.
    pub fn split(self) -> (ConnectionReader<T>, ConnectionWriter<T>) {
        let writer = ConnectionWriter::new(self.write.into_inner(), self.shared, self.deadlines);
        (ConnectionReader::new(self.read, writer.clone()), writer)
    }
}

impl<T> Connection<T> {
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_open(&self) -> bool {
        !self.shared.is_closed()
    }

    pub fn role(&self) -> Role {
        self.shared.role()
    }

    /// Whether a Ping has been sent and its Pong not yet received.
    pub fn ping_outstanding(&self) -> bool {
        self.shared.ping_outstanding()
    }

    pub fn read_limit(&self) -> usize {
        self.read.read_limit()
    }

    /// Largest accepted incoming frame payload, `0` = unlimited. Always capped
    /// by `Limits::max_frame_size`.
    pub fn set_read_limit(&mut self, limit: usize) {
        self.read.set_read_limit(limit);
    }

    pub fn write_limit(&self) -> usize {
        self.shared.write_limit()
    }

    /// Largest outgoing message payload, `0` = unlimited. Close messages are exempt.
    pub fn set_write_limit(&mut self, limit: usize) {
        self.shared.set_write_limit(limit);
    }

    pub fn set_ping_handler<F>(&mut self, handler: F)
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        self.read.set_ping_handler(Box::new(handler));
    }

    pub fn set_pong_handler<F>(&mut self, handler: F)
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        self.read.set_pong_handler(Box::new(handler));
    }

    /// Shared handle to this connection's deadlines.
    ///
    /// Clones can be moved into handlers to extend the read deadline on
    /// every heartbeat.
    pub fn deadlines(&self) -> DeadlineHandle {
        self.deadlines.clone()
    }

    /// Deadline for every subsequent transport read. `None` waits forever.
    pub fn set_read_deadline(&self, deadline: Option<Instant>) {
        self.deadlines.set_read(deadline);
    }

    /// Deadline for every subsequent transport write. `None` waits forever.
    pub fn set_write_deadline(&self, deadline: Option<Instant>) {
        self.deadlines.set_write(deadline);
    }
}

impl<T: Unpin> Connection<T> {
    /// Give back the transport. Bytes buffered but not yet decoded are lost.
    pub fn into_inner(self) -> T {
        let write = self.write.into_inner().into_inner();
        self.read.into_inner().unsplit(write)
    }
}

impl<T> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("role", &self.role())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
