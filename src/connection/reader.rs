use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::writer::{ConnectionWriter, Shared, WriteSide};
use crate::codec::{DeadlineHandle, FrameReader};
use crate::config::Config;
use crate::connection::{ConnectionState, Role};
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame, Message};
use crate::protocol::{MessageAssembler, OpCode};

/// Heartbeat callback, run when a Ping or an expected Pong is serviced.
///
/// An error aborts the `recv` call that ran it and is returned to the caller.
pub type Handler = Box<dyn FnMut() -> Result<()> + Send>;

/// The receive loop. Replies it owes the peer go through the shared writer.
pub(crate) struct ReadSide<T> {
    frames: FrameReader<ReadHalf<T>>,
    assembler: MessageAssembler,
    ping_handler: Option<Handler>,
    pong_handler: Option<Handler>,
    shared: Arc<Shared>,
}

impl<T> ReadSide<T> {
    pub(crate) fn new(frames: FrameReader<ReadHalf<T>>, config: &Config, shared: Arc<Shared>) -> Self {
        Self {
            frames,
            assembler: MessageAssembler::new(config.limits.clone()),
            ping_handler: None,
            pong_handler: None,
            shared,
        }
    }

    pub(crate) fn read_limit(&self) -> usize {
        self.frames.read_limit()
    }

    pub(crate) fn set_read_limit(&mut self, limit: usize) {
        self.frames.set_read_limit(limit);
    }

    pub(crate) fn set_ping_handler(&mut self, handler: Handler) {
        self.ping_handler = Some(handler);
    }

    pub(crate) fn set_pong_handler(&mut self, handler: Handler) {
        self.pong_handler = Some(handler);
    }

    pub(crate) fn into_inner(self) -> ReadHalf<T> {
        self.frames.into_inner()
    }
}

impl<T: AsyncRead + AsyncWrite> ReadSide<T> {
    pub(crate) async fn recv(&mut self, writer: &Mutex<WriteSide<T>>) -> Result<Message> {
        if self.shared.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        loop {
            let frame = match self.frames.read_frame().await {
                Ok(frame) => frame,
                Err(err) => return Err(self.fail(err, writer).await),
            };

            match frame.opcode {
                OpCode::Ping => {
                    writer.lock().await.pong(frame.into_payload()).await?;
                    if let Some(handler) = self.ping_handler.as_mut() {
                        handler()?;
                    }
                }
                OpCode::Pong => {
                    if !self.shared.take_ping() {
                        trace!("discarding unsolicited pong");
                        continue;
                    }
                    if let Some(handler) = self.pong_handler.as_mut() {
                        handler()?;
                    }
                }
                OpCode::Close => return self.on_close(frame.into_payload(), writer).await,
                _ => {
                    let message = match self.assembler.push(frame) {
                        Ok(Some(assembled)) => assembled.into_message(),
                        Ok(None) => continue,
                        Err(err) => Err(err),
                    };
                    return match message {
                        Ok(message) => Ok(message),
                        Err(err) => Err(self.fail(err, writer).await),
                    };
                }
            }
        }
    }

    async fn on_close(&mut self, payload: Vec<u8>, writer: &Mutex<WriteSide<T>>) -> Result<Message> {
        let close = match CloseFrame::parse(&payload) {
            Ok(close) => close,
            Err(err) => return Err(self.fail(err, writer).await),
        };
        debug!(
            role = %self.shared.role(),
            code = close.as_ref().map(|c| c.code.as_u16()),
            "close received"
        );

        let reason = close.as_ref().map_or("", |c| c.reason.as_str());
        writer.lock().await.close_with(CloseCode::Normal, reason).await;
        Ok(Message::Close(close))
    }

    /// Apply the consequences of a failed read and hand the error back.
    ///
    /// Violations close the connection with their status code. Transport
    /// errors other than a timeout leave the stream unusable and also close
    /// it. Unknown opcodes and timeouts change nothing.
    async fn fail(&mut self, err: Error, writer: &Mutex<WriteSide<T>>) -> Error {
        match (&err, err.close_code()) {
            (Error::UnknownOpcode(_), _) => {}
            (_, Some(code)) => {
                warn!(role = %self.shared.role(), error = %err, code = code.as_u16(), "closing after violation");
                writer.lock().await.close_with(code, &err.to_string()).await;
            }
            (Error::Io { .. }, None) if !err.is_timeout() => {
                debug!(role = %self.shared.role(), error = %err, "transport failed");
                self.shared.mark_closed();
            }
            _ => {}
        }
        err
    }
}

/// Receiving half of a split [`Connection`](super::Connection).
///
/// Pings are still answered and the peer's Close still echoed, through the
/// writer this reader was split from.
pub struct ConnectionReader<T> {
    read: ReadSide<T>,
    writer: ConnectionWriter<T>,
}

impl<T> ConnectionReader<T> {
    pub(crate) fn new(read: ReadSide<T>, writer: ConnectionWriter<T>) -> Self {
        Self { read, writer }
    }

    pub fn state(&self) -> ConnectionState {
        self.writer.state()
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_open()
    }

    pub fn role(&self) -> Role {
        self.writer.role()
    }

    pub fn read_limit(&self) -> usize {
        self.read.read_limit()
    }

    /// Largest accepted incoming frame payload, `0` = unlimited. Always capped
    /// by `Limits::max_frame_size`.
    pub fn set_read_limit(&mut self, limit: usize) {
        self.read.set_read_limit(limit);
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

    pub fn deadlines(&self) -> DeadlineHandle {
        self.writer.deadlines()
    }

    /// Deadline for every subsequent transport read. `None` waits forever.
    pub fn set_read_deadline(&self, deadline: Option<Instant>) {
        self.writer.deadlines().set_read(deadline);
    }
}

impl<T: AsyncRead + AsyncWrite> ConnectionReader<T> {
    /// Receive the next data message, or the peer's Close.
    /// See [`Connection::recv`](super::Connection::recv).
    pub async fn recv(&mut self) -> Result<Message> {
        self.read.recv(self.writer.side()).await
    }
}
