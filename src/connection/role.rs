//! Which end of the handshake a connection sits on.

/// Connection role, fixed by the handshake that created the connection.
///
/// The role decides the masking obligation in both directions: clients mask
/// what they send and reject masked input, servers do the opposite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Dialed the connection.
    Client,
    /// Accepted the connection through an upgrade.
    Server,
}

impl Role {
    /// Outgoing frames carry a mask key.
    #[inline]
    #[must_use]
    pub const fn must_mask(&self) -> bool {
        matches!(self, Role::Client)
    }

    /// Incoming frames must carry a mask key.
    #[inline]
    #[must_use]
    pub const fn expects_masked(&self) -> bool {
        self.peer().must_mask()
    }

    /// The role at the other end.
    #[inline]
    #[must_use]
    pub const fn peer(&self) -> Role {
        match self {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Role::Client => "client",
            Role::Server => "server",
        })
    }
}
