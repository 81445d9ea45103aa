//! In-memory transport for unit tests.

use std::io::Cursor;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

#[derive(Debug, Default)]
struct Wire {
    input: Cursor<Vec<u8>>,
    output: Vec<u8>,
    shut_down: bool,
}

/// Serves its input (optionally a few bytes per read) and records writes.
#[derive(Debug)]
pub(crate) struct MockStream {
    chunk: usize,
    wire: Arc<Mutex<Wire>>,
}

/// View of a [`MockStream`], still usable after the stream has been moved
/// into a connection.
#[derive(Debug, Clone)]
pub(crate) struct WireTap {
    wire: Arc<Mutex<Wire>>,
}

impl WireTap {
    pub(crate) fn written(&self) -> Vec<u8> {
        self.wire.lock().output.clone()
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.wire.lock().shut_down
    }

    /// Input bytes not yet handed out to the reader.
    pub(crate) fn unread(&self) -> usize {
        let wire = self.wire.lock();
        wire.input.get_ref().len() - wire.input.position() as usize
    }
}

impl MockStream {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self {
            chunk: usize::MAX,
            wire: Arc::new(Mutex::new(Wire {
                input: Cursor::new(data),
                ..Wire::default()
            })),
        }
    }

    /// Hand out at most `chunk` bytes per read.
    pub(crate) fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    pub(crate) fn tap(&self) -> WireTap {
        WireTap {
            wire: Arc::clone(&self.wire),
        }
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let mut wire = self.wire.lock();
        let pos = wire.input.position() as usize;
        let data = wire.input.get_ref();
        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }
        let to_copy = (data.len() - pos).min(buf.remaining()).min(self.chunk);
        buf.put_slice(&data[pos..pos + to_copy]);
        wire.input.set_position((pos + to_copy) as u64);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let mut wire = self.wire.lock();
        if wire.shut_down {
            return Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()));
        }
        wire.output.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.wire.lock().shut_down = true;
        Poll::Ready(Ok(()))
    }
}
