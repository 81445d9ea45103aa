//! Reassembly of fragmented data messages (RFC 6455 Section 5.4).

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::{Frame, OpCode};

/// Collects Text/Binary frames and their continuations into whole messages.
///
/// Control frames never reach the assembler; the connection services them
/// between fragments.
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: BytesMut,
    fragment_count: usize,
    opcode: Option<OpCode>,
    limits: Limits,
}

impl MessageAssembler {
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            fragment_count: 0,
            opcode: None,
            limits,
        }
    }

    /// Add a data frame to the message being assembled.
    ///
    /// Returns `Some` once a frame with FIN set completes the message.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a continuation with nothing to
    ///   continue, a new data frame while one is in progress, or a control frame
    /// - `Error::TooManyFragments` / `Error::MessageTooLarge` when limits are hit
    pub fn push(&mut self, frame: Frame) -> Result<Option<AssembledMessage>> {
        if frame.opcode.is_control() {
            return Err(Error::ProtocolViolation(format!(
                "{} frame passed to message assembler",
                frame.opcode
            )));
        }

        let opcode = match (frame.opcode, self.opcode) {
            (OpCode::Continuation, Some(opcode)) => opcode,
            (OpCode::Continuation, None) => {
                return Err(Error::ProtocolViolation(
                    "Unexpected continuation frame".into(),
                ));
            }
            (_, Some(_)) => {
                return Err(Error::ProtocolViolation(
                    "Expected continuation frame".into(),
                ));
            }
            (opcode, None) => opcode,
        };

        self.limits.check_fragment_count(self.fragment_count + 1)?;
        self.limits
            .check_message_size(self.buffer.len() + frame.payload().len())?;

        self.opcode = Some(opcode);
        self.fragment_count += 1;
        self.buffer.extend_from_slice(frame.payload());

        if !frame.fin {
            return Ok(None);
        }

        let payload = self.buffer.split().to_vec();
        self.opcode = None;
        self.fragment_count = 0;
        Ok(Some(AssembledMessage { opcode, payload }))
    }

    /// Whether a fragmented message is in progress.
    #[must_use]
    pub fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }

    /// Drop any partial message.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.fragment_count = 0;
        self.opcode = None;
    }
}

/// A fully assembled data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledMessage {
    /// `Text` or `Binary`, from the first fragment.
    pub opcode: OpCode,
    /// Concatenated payloads.
    pub payload: Vec<u8>,
}

impl AssembledMessage {
    /// Convert into a [`Message`], checking that text is valid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUtf8` for a Text message with invalid UTF-8.
    pub fn into_message(self) -> Result<Message> {
        match self.opcode {
            OpCode::Text => String::from_utf8(self.payload)
                .map(Message::Text)
                .map_err(|_| Error::InvalidUtf8),
            _ => Ok(Message::Binary(self.payload)),
        }
    }
}
