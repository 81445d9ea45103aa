//! Error types for the WebSocket engine.
//!
//! Every failure is returned to the immediate caller; the engine never
//! retries. Protocol and limit violations detected while reading also close
//! the connection, and [`Error::close_code`] reports the status code that was
//! (or, for unknown opcodes, should be) sent to the peer.

use std::io::ErrorKind;

use thiserror::Error;

use crate::message::CloseCode;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons an opening handshake can fail, on either side.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HandshakeError {
    /// `Connection` header does not carry the `Upgrade` token.
    #[error("Connection header must contain \"Upgrade\"")]
    WrongConnectionHeader,

    /// `Upgrade` header is not `websocket`.
    #[error("Upgrade header must be \"websocket\"")]
    WrongUpgradeHeader,

    /// Upgrade requests must use GET.
    #[error("request method must be GET, got {0}")]
    WrongMethod(String),

    /// `Sec-WebSocket-Version` is not 13.
    #[error("Sec-WebSocket-Version must be 13")]
    WrongVersion,

    /// The configured origin check refused the request.
    #[error("origin not allowed: {0}")]
    OriginRejected(String),

    /// `Sec-WebSocket-Key` header is absent.
    #[error("missing Sec-WebSocket-Key header")]
    MissingKey,

    /// `Sec-WebSocket-Key` is not base64 of a 16-byte nonce.
    #[error("invalid Sec-WebSocket-Key")]
    InvalidKey,

    /// The HTTP layer could not hand over its transport.
    #[error("failed to take over the HTTP connection: {0}")]
    HijackFailed(String),

    /// The server answered with something other than 101.
    #[error("expected status 101, got {0}")]
    BadStatus(u16),

    /// `Sec-WebSocket-Accept` missing or not matching the nonce.
    #[error("Sec-WebSocket-Accept does not match the request key")]
    AcceptMismatch,

    /// The dial target could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Only `ws://` and `http://` targets are dialed.
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),

    /// Connecting or exchanging the handshake failed at the transport level.
    #[error("transport error: {0}")]
    Transport(String),

    /// The handshake did not finish within the dial timeout.
    #[error("handshake timed out")]
    Timeout,

    /// The HTTP head could not be parsed.
    #[error("malformed http message: {0}")]
    Malformed(String),
}

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Opening handshake failed.
    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    /// Handshake head exceeds the configured maximum.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Bytes received so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// A response header value would allow header injection.
    #[error("Invalid value for header {header}: {reason}")]
    InvalidHeaderValue {
        /// Header name.
        header: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Reserved bits set without negotiated extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Unmasked client frame.
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Masked server frame.
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// Control frame fragmented.
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Opcode outside the RFC 6455 table.
    #[error("Unknown opcode: {0:#x}")]
    UnknownOpcode(u8),

    /// Invalid UTF-8 in text message.
    #[error("Invalid UTF-8 in text message")]
    InvalidUtf8,

    /// Close code that must not appear on the wire.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Incoming frame exceeds the read limit.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared payload length.
        size: u64,
        /// Effective limit.
        max: u64,
    },

    /// Message exceeds the write limit or the reassembly limit.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Actual fragment count.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// Operation attempted on a closed connection.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Transport failure, including deadline expiry.
    #[error("I/O error ({kind:?}): {message}")]
    Io {
        /// Kind of the underlying error.
        kind: ErrorKind,
        /// Rendered error.
        message: String,
    },
}

impl Error {
    /// The deadline error surfaced when a read or write deadline elapses.
    #[must_use]
    pub fn timed_out() -> Self {
        Error::Io {
            kind: ErrorKind::TimedOut,
            message: "deadline exceeded".into(),
        }
    }

    /// Returns `true` for deadline and transport timeouts.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Io { kind: ErrorKind::TimedOut, .. })
    }

    /// Returns `true` for the limit family (`FrameTooLarge`, `MessageTooLarge`, `TooManyFragments`).
    #[must_use]
    pub const fn is_limit_exceeded(&self) -> bool {
        matches!(
            self,
            Error::FrameTooLarge { .. } | Error::MessageTooLarge { .. } | Error::TooManyFragments { .. }
        )
    }

    /// Status code matching this error, if it is one the peer should hear about.
    #[must_use]
    pub const fn close_code(&self) -> Option<CloseCode> {
        match self {
            Error::ProtocolViolation(_)
            | Error::ReservedBitsSet
            | Error::UnmaskedClientFrame
            | Error::MaskedServerFrame
            | Error::FragmentedControlFrame
            | Error::ControlFrameTooLarge(_)
            | Error::InvalidCloseCode(_) => Some(CloseCode::PolicyViolation),
            Error::UnknownOpcode(_) => Some(CloseCode::UnsupportedData),
            Error::InvalidUtf8 => Some(CloseCode::InvalidPayload),
            Error::FrameTooLarge { .. }
            | Error::MessageTooLarge { .. }
            | Error::TooManyFragments { .. } => Some(CloseCode::MessageTooBig),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::FrameTooLarge {
            size: 20_000_000,
            max: 16_000_000,
        };
        assert_eq!(
            err.to_string(),
            "Frame too large: 20000000 bytes (max: 16000000)"
        );
    }

    #[test]
    fn test_error_from_io_keeps_kind() {
        let io_err = std::io::Error::new(ErrorKind::BrokenPipe, "pipe broken");
        let ws_err: Error = io_err.into();
        assert!(matches!(ws_err, Error::Io { kind: ErrorKind::BrokenPipe, .. }));
    }

    #[test]
    fn test_timed_out() {
        assert!(Error::timed_out().is_timeout());
        assert!(!Error::ConnectionClosed.is_timeout());
    }

    #[test]
    fn test_handshake_error_wraps() {
        let err: Error = HandshakeError::BadStatus(404).into();
        assert_eq!(err.to_string(), "Handshake failed: expected status 101, got 404");
        assert_eq!(err.close_code(), None);
    }

    #[test]
    fn test_close_code_mapping() {
        assert_eq!(Error::ReservedBitsSet.close_code(), Some(CloseCode::PolicyViolation));
        assert_eq!(Error::UnmaskedClientFrame.close_code(), Some(CloseCode::PolicyViolation));
        assert_eq!(Error::UnknownOpcode(0x3).close_code(), Some(CloseCode::UnsupportedData));
        assert_eq!(
            Error::FrameTooLarge { size: 10, max: 5 }.close_code(),
            Some(CloseCode::MessageTooBig)
        );
        assert_eq!(Error::InvalidUtf8.close_code(), Some(CloseCode::InvalidPayload));
        assert_eq!(Error::ConnectionClosed.close_code(), None);
    }

    #[test]
    fn test_limit_family() {
        assert!(Error::MessageTooLarge { size: 2, max: 1 }.is_limit_exceeded());
        assert!(Error::TooManyFragments { count: 2, max: 1 }.is_limit_exceeded());
        assert!(!Error::ReservedBitsSet.is_limit_exceeded());
    }
}
