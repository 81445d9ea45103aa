//! Connection status.

/// Lifecycle status of a connection.
///
/// A connection is created Open by a successful handshake and moves to
/// Closed exactly once: when a Close frame is sent or received, or when a
/// fatal protocol or transport error ends it. There is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ConnectionState {
    /// Reads and writes are allowed.
    #[default]
    Open,
    /// Every read and write fails with `ConnectionClosed`.
    Closed,
}

impl ConnectionState {
    #[must_use]
    #[inline]
    pub const fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    #[must_use]
    #[inline]
    pub const fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}
