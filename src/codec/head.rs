//! Reading an HTTP head off a raw stream.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::Limits;
use crate::error::{HandshakeError, Result};
use crate::protocol::handshake::find_head_end;

/// Read until the blank line that ends an HTTP head.
///
/// Returns the head (including the terminating blank line); bytes read
/// past it stay in `buf`.
///
/// # Errors
///
/// - `HandshakeTooLarge` once `limits.max_handshake_size` bytes arrive
///   without a complete head
/// - `HandshakeError::Transport` if the stream ends first
/// - `Io` for transport errors
///
/// Unbounded in time; callers wrap it in their handshake timeout.
pub(crate) async fn read_head<T>(
    io: &mut T,
    buf: &mut BytesMut,
    limits: &Limits,
) -> Result<BytesMut>
where
    T: AsyncRead + Unpin,
{
    loop {
        if let Some(end) = find_head_end(buf) {
            limits.check_handshake_size(end)?;
            return Ok(buf.split_to(end));
        }
        limits.check_handshake_size(buf.len())?;

        buf.reserve(1024);
        let n = io.read_buf(buf).await?;
        if n == 0 {
            return Err(HandshakeError::Transport(
                "connection closed during handshake".into(),
            )
            .into());
        }
    }
}
