//! Splitting outgoing data messages into frames (RFC 6455 Section 5.4).

use std::iter::Peekable;
use std::slice::Chunks;

use crate::protocol::{Frame, OpCode};

/// Iterator over the frames of one outgoing data message.
///
/// The first frame carries the message opcode, the rest are continuations,
/// and only the last has FIN set. An empty payload still yields one frame.
pub struct MessageFragmenter<'a> {
    chunks: Peekable<Chunks<'a, u8>>,
    opcode: OpCode,
    started: bool,
    len: usize,
    sent: usize,
}

impl<'a> MessageFragmenter<'a> {
    #[must_use]
    pub fn new(payload: &'a [u8], opcode: OpCode, fragment_size: usize) -> Self {
        Self {
            chunks: payload.chunks(fragment_size.max(1)).peekable(),
            opcode,
            started: false,
            len: payload.len(),
            sent: 0,
        }
    }

    /// Bytes not yet handed out.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.len - self.sent
    }
}

impl Iterator for MessageFragmenter<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        let chunk = match self.chunks.next() {
            Some(chunk) => chunk,
            None if !self.started => &[],
            None => return None,
        };
        let opcode = if self.started {
            OpCode::Continuation
        } else {
            self.opcode
        };
        self.started = true;
        self.sent += chunk.len();
        let fin = self.chunks.peek().is_none();
        Some(Frame::new(fin, opcode, chunk.to_vec()))
    }
}
