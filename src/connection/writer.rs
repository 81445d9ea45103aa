use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::io::{AsyncWrite, WriteHalf};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::codec::{DeadlineHandle, FrameWriter};
use crate::config::Config;
use crate::connection::fragmenter::MessageFragmenter;
use crate::connection::{ConnectionState, Role};
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame, Message};
use crate::protocol::Frame;
use crate::protocol::frame::MAX_CONTROL_FRAME_PAYLOAD;

/// State seen by both halves of a connection.
#[derive(Debug)]
pub(crate) struct Shared {
    role: Role,
    closed: AtomicBool,
    pending_ping: AtomicBool,
    write_limit: AtomicUsize,
}

impl Shared {
    pub(crate) fn new(role: Role, write_limit: usize) -> Self {
        Self {
            role,
            closed: AtomicBool::new(false),
            pending_ping: AtomicBool::new(false),
            write_limit: AtomicUsize::new(write_limit),
        }
    }

    pub(crate) fn role(&self) -> Role {
        self.role
    }

    pub(crate) fn state(&self) -> ConnectionState {
        if self.is_closed() {
            ConnectionState::Closed
        } else {
            ConnectionState::Open
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Move to Closed. Returns whether this call did it.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn ping_outstanding(&self) -> bool {
        self.pending_ping.load(Ordering::Acquire)
    }

    /// Clear the outstanding Ping. Returns whether one was outstanding.
    pub(crate) fn take_ping(&self) -> bool {
        self.pending_ping.swap(false, Ordering::AcqRel)
    }

    fn set_ping_outstanding(&self, outstanding: bool) {
        self.pending_ping.store(outstanding, Ordering::Release);
    }

    pub(crate) fn write_limit(&self) -> usize {
        self.write_limit.load(Ordering::Relaxed)
    }

    pub(crate) fn set_write_limit(&self, limit: usize) {
        self.write_limit.store(limit, Ordering::Relaxed);
    }
}

/// Everything a connection writes goes through here: messages from the
/// owner, Pongs and Close echoes from the reader.
pub(crate) struct WriteSide<T> {
    frames: FrameWriter<WriteHalf<T>>,
    fragment_size: Option<usize>,
    shared: Arc<Shared>,
}

impl<T> WriteSide<T> {
    pub(crate) fn new(frames: FrameWriter<WriteHalf<T>>, config: &Config, shared: Arc<Shared>) -> Self {
        Self {
            frames,
            fragment_size: config.fragment_size,
            shared,
        }
    }

    pub(crate) fn into_inner(self) -> WriteHalf<T> {
        self.frames.into_inner()
    }
}

impl<T: AsyncWrite> WriteSide<T> {
    pub(crate) async fn send(&mut self, message: Message) -> Result<()> {
        if self.shared.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let message = match message {
            Message::Close(close) => return self.send_close(close).await,
            other => other,
        };

        let len = message.payload_len();
        let limit = self.shared.write_limit();
        if limit != 0 && len > limit {
            warn!(role = %self.shared.role(), size = len, max = limit, "write limit exceeded");
            self.close_with(CloseCode::MessageTooBig, "message exceeds write limit")
                .await;
            return Err(Error::MessageTooLarge { size: len, max: limit });
        }

        let is_ping = matches!(message, Message::Ping(_));
        let frame = Frame::from(message);
        frame.validate()?;

        // Marked before writing so a fast Pong is not taken as unsolicited.
        if is_ping {
            self.shared.set_ping_outstanding(true);
        }
        let written = match self.fragment_size {
            Some(size) if frame.opcode.is_data() && frame.payload().len() > size => {
                self.write_fragmented(&frame, size).await
            }
            _ => self.frames.write_frame(&frame).await,
        };
        if let Err(err) = written {
            if is_ping {
                self.shared.set_ping_outstanding(false);
            }
            self.write_failed(&err);
            return Err(err);
        }
        Ok(())
    }

    pub(crate) async fn close(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        if self.shared.is_closed() {
            return Ok(());
        }
        match self.send_close(Some(CloseFrame::new(code, reason))).await {
            Err(Error::ConnectionClosed) => Ok(()),
            other => other,
        }
    }

    /// Answer a Ping. Skipped once the connection is closed.
    pub(crate) async fn pong(&mut self, payload: Vec<u8>) -> Result<()> {
        if self.shared.is_closed() {
            return Ok(());
        }
        let written = self.frames.write_frame(&Frame::pong(payload)).await;
        if let Err(err) = &written {
            self.write_failed(err);
        }
        written
    }

    /// Best-effort Close with `code`, then shut down.
    ///
    /// Does nothing if the connection was already closed, so a Close we
    /// initiated is never followed by an echo.
    pub(crate) async fn close_with(&mut self, code: CloseCode, reason: &str) {
        if !self.shared.mark_closed() {
            return;
        }
        if !self.frames.is_torn() {
            let frame = Frame::close(Some(code.as_u16()), truncate_reason(reason));
            if let Err(err) = self.frames.write_frame(&frame).await {
                debug!(error = %err, "failed to send close");
            }
        }
        if let Err(err) = self.frames.shutdown().await {
            debug!(error = %err, "failed to shut down transport");
        }
    }

    async fn write_fragmented(&mut self, frame: &Frame, size: usize) -> Result<()> {
        let fragments = MessageFragmenter::new(frame.payload(), frame.opcode, size);
        for (i, fragment) in fragments.enumerate() {
            if let Err(err) = self.frames.write_frame(&fragment).await {
                // The peer is left waiting for continuations that never come.
                if i > 0 && self.shared.mark_closed() {
                    debug!(role = %self.shared.role(), "message cut off between fragments");
                }
                return Err(err);
            }
        }
        Ok(())
    }

    async fn send_close(&mut self, close: Option<CloseFrame>) -> Result<()> {
        if let Some(code) = close.as_ref().map(|c| c.code)
            && !code.is_valid()
        {
            return Err(Error::InvalidCloseCode(code.as_u16()));
        }
        let frame = Frame::from(Message::Close(close));
        frame.validate()?;

        if !self.shared.mark_closed() {
            return Err(Error::ConnectionClosed);
        }
        let written = self.frames.write_frame(&frame).await;
        let shut = self.frames.shutdown().await;
        debug!(role = %self.shared.role(), "connection closed locally");
        written.and(shut)
    }

    /// A timeout that put nothing on the wire leaves the connection usable.
    fn write_failed(&self, err: &Error) {
        if (self.frames.is_torn() || !err.is_timeout()) && self.shared.mark_closed() {
            debug!(role = %self.shared.role(), error = %err, "write failed, connection closed");
        } else {
            debug!(role = %self.shared.role(), error = %err, "write failed");
        }
    }
}

/// Longest prefix of `reason` that fits a Close payload next to its code.
pub(crate) fn truncate_reason(reason: &str) -> &str {
    let max = MAX_CONTROL_FRAME_PAYLOAD - 2;
    if reason.len() <= max {
        return reason;
    }
    let mut end = max;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    &reason[..end]
}

/// Sending half of a split [`Connection`](super::Connection).
///
/// Clones share one transport; concurrent sends are serialized frame by
/// frame, and never interleave with the Pongs and Close echoes the reader
/// writes.
pub struct ConnectionWriter<T> {
    inner: Arc<Mutex<WriteSide<T>>>,
    shared: Arc<Shared>,
    deadlines: DeadlineHandle,
}

impl<T> Clone for ConnectionWriter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            shared: Arc::clone(&self.shared),
            deadlines: self.deadlines.clone(),
        }
    }
}

impl<T> ConnectionWriter<T> {
    pub(crate) fn new(side: WriteSide<T>, shared: Arc<Shared>, deadlines: DeadlineHandle) -> Self {
        Self {
            inner: Arc::new(Mutex::new(side)),
            shared,
            deadlines,
        }
    }

    pub(crate) fn side(&self) -> &Mutex<WriteSide<T>> {
        &self.inner
    }

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

    pub fn write_limit(&self) -> usize {
        self.shared.write_limit()
    }

    /// Largest outgoing message payload, `0` = unlimited. Close messages are exempt.
    pub fn set_write_limit(&self, limit: usize) {
        self.shared.set_write_limit(limit);
    }

    pub fn deadlines(&self) -> DeadlineHandle {
        self.deadlines.clone()
    }

    /// Deadline for every subsequent transport write. `None` waits forever.
    pub fn set_write_deadline(&self, deadline: Option<Instant>) {
        self.deadlines.set_write(deadline);
    }
}

impl<T: AsyncWrite> ConnectionWriter<T> {
    /// Send a message. See [`Connection::send`](super::Connection::send).
    pub async fn send(&self, message: Message) -> Result<()> {
        self.inner.lock().await.send(message).await
    }

    /// Send a Ping carrying `data`.
    pub async fn ping(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send(Message::Ping(data.into())).await
    }

    /// Send a Close, then shut the transport down. No-op once closed.
    pub async fn close(&self, code: CloseCode, reason: &str) -> Result<()> {
        self.inner.lock().await.close(code, reason).await
    }
}
