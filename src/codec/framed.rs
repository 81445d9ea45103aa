use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use super::deadline::{DeadlineHandle, with_deadline};
use crate::config::Config;
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::frame::{FrameHeader, peek_payload_len};
use crate::protocol::validation::FrameValidator;
use crate::protocol::Frame;
use crate::random::RandomSource;

/// Decodes frames off the read half of a stream.
///
/// Frames are decoded incrementally: the reserved bits are checked as soon
/// as the first byte is buffered, masking on the second, and the declared
/// length before any payload is waited for.
pub struct FrameReader<R> {
    io: R,
    read_buf: BytesMut,
    read_buffer_size: usize,
    validator: FrameValidator,
    deadlines: DeadlineHandle,
}

impl<R> FrameReader<R> {
    /// Reader that starts decoding from `leftover`, bytes already read off
    /// `io` past the end of the handshake.
    #[must_use]
    pub fn new(
        io: R,
        role: Role,
        config: &Config,
        leftover: BytesMut,
        deadlines: DeadlineHandle,
    ) -> Self {
        let mut validator = FrameValidator::new(role, config.limits.clone());
        validator.set_read_limit(config.read_limit);

        let mut read_buf = BytesMut::with_capacity(config.read_buffer_size.max(leftover.len()));
        read_buf.extend_from_slice(&leftover);

        Self {
            io,
            read_buf,
            read_buffer_size: config.read_buffer_size,
            validator,
            deadlines,
        }
    }

    /// Connection read limit, `0` = unlimited.
    #[must_use]
    pub fn read_limit(&self) -> usize {
        self.validator.read_limit()
    }

    pub fn set_read_limit(&mut self, limit: usize) {
        self.validator.set_read_limit(limit);
    }

    #[must_use]
    pub fn into_inner(self) -> R {
        self.io
    }

    /// Validate as much of the next header as is buffered.
    ///
    /// Returns the header once it is complete and has passed every check.
    fn decode_header(&self) -> Result<Option<FrameHeader>> {
        let Some(&byte0) = self.read_buf.first() else {
            return Ok(None);
        };
        self.validator.validate_first_byte(byte0)?;

        let Some(&byte1) = self.read_buf.get(1) else {
            return Ok(None);
        };
        self.validator.validate_second_byte(byte1)?;

        let Some(payload_len) = peek_payload_len(&self.read_buf)? else {
            return Ok(None);
        };
        self.validator.validate_frame_size(payload_len)?;

        FrameHeader::parse(&self.read_buf)
    }
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Read the next frame.
    ///
    /// # Errors
    ///
    /// - header violations (`ReservedBitsSet`, `UnmaskedClientFrame`,
    ///   `MaskedServerFrame`, `FrameTooLarge`, `ProtocolViolation`), raised
    ///   before the payload is read
    /// - `UnknownOpcode`, raised after the whole frame has been consumed
    /// - `FragmentedControlFrame` / `ControlFrameTooLarge`
    /// - `Io` on transport failure, end of stream, or an expired read deadline
    pub async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(header) = self.decode_header()? {
                let total = header.frame_len()?;
                if self.read_buf.len() >= total {
                    let mut raw = self.read_buf.split_to(total);
                    let payload = raw.split_off(header.header_len).to_vec();
                    let frame = Frame::from_parts(&header, payload)?;
                    frame.validate()?;
                    trace!(
                        opcode = %frame.opcode,
                        fin = frame.fin,
                        len = frame.payload().len(),
                        "read frame"
                    );
                    return Ok(frame);
                }
                self.read_buf.reserve(total - self.read_buf.len());
            }

            self.fill_read_buf().await?;
        }
    }

    async fn fill_read_buf(&mut self) -> Result<()> {
        if self.read_buf.len() == self.read_buf.capacity() {
            self.read_buf.reserve(self.read_buffer_size.max(64));
        }
        let deadline = self.deadlines.read();
        let n = with_deadline(deadline, self.io.read_buf(&mut self.read_buf)).await?;
        if n == 0 {
            return Err(Error::Io {
                kind: std::io::ErrorKind::UnexpectedEof,
                message: "connection closed by peer".into(),
            });
        }
        Ok(())
    }
}

/// Encodes frames onto the write half of a stream.
///
/// Tracks whether a failed write left part of a frame on the wire, after
/// which the stream can no longer carry frames.
pub struct FrameWriter<W> {
    io: W,
    write_buf: BytesMut,
    role: Role,
    random: Box<dyn RandomSource>,
    deadlines: DeadlineHandle,
    torn: bool,
}

impl<W> FrameWriter<W> {
    #[must_use]
    pub fn new(
        io: W,
        role: Role,
        config: &Config,
        random: Box<dyn RandomSource>,
        deadlines: DeadlineHandle,
    ) -> Self {
        Self {
            io,
            write_buf: BytesMut::with_capacity(config.write_buffer_size),
            role,
            random,
            deadlines,
            torn: false,
        }
    }

    /// True once a write failed after some of its bytes were accepted by
    /// the transport.
    #[must_use]
    pub fn is_torn(&self) -> bool {
        self.torn
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.io
    }
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Encode and write one frame, masking it with a fresh key if this side masks.
    ///
    /// # Errors
    ///
    /// `Io` on transport failure or an expired write deadline. Check
    /// [`is_torn`](Self::is_torn) to learn whether any of the frame was sent.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let mask = self.role.must_mask().then(|| self.random.mask_key());

        self.write_buf.clear();
        frame.encode(&mut self.write_buf, mask);

        let mut written = 0;
        while written < self.write_buf.len() {
            let deadline = self.deadlines.write();
            match with_deadline(deadline, self.io.write(&self.write_buf[written..])).await {
                Ok(0) => {
                    self.torn |= written > 0;
                    return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
                }
                Ok(n) => written += n,
                Err(err) => {
                    self.torn |= written > 0;
                    return Err(err);
                }
            }
        }
        if let Err(err) = with_deadline(self.deadlines.write(), self.io.flush()).await {
            self.torn = true;
            return Err(err);
        }

        trace!(
            opcode = %frame.opcode,
            fin = frame.fin,
            len = frame.payload().len(),
            "wrote frame"
        );
        Ok(())
    }

    /// Shut down the write half of the transport.
    pub async fn shutdown(&mut self) -> Result<()> {
        with_deadline(self.deadlines.write(), self.io.shutdown()).await
    }
}
