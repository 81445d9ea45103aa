//! Incoming frame header checks (RFC 6455 Section 5.1, 5.2).
//!
//! The checks run in wire order as header bytes arrive, so a bad frame is
//! rejected before its payload is read:
//! - reserved bits, from the first byte
//! - masking, from the second byte
//! - declared payload length, once the extended length is known

use crate::config::Limits;
use crate::connection::Role;
use crate::error::{Error, Result};

/// Header validator for the receiving side of a connection.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    role: Role,
    limits: Limits,
    /// Connection read limit, `0` = unlimited.
    read_limit: usize,
}

impl FrameValidator {
    /// Create a validator for the given local role.
    #[must_use]
    pub fn new(role: Role, limits: Limits) -> Self {
        Self {
            role,
            limits,
            read_limit: 0,
        }
    }

    /// Replace the connection read limit (`0` = unlimited).
    pub fn set_read_limit(&mut self, limit: usize) {
        self.read_limit = limit;
    }

    /// Current connection read limit.
    #[must_use]
    pub fn read_limit(&self) -> usize {
        self.read_limit
    }

    /// Largest payload a single frame may declare.
    #[must_use]
    pub fn max_payload(&self) -> u64 {
        self.limits.effective_read_limit(self.read_limit)
    }

    /// Check the reserved bits of the first header byte.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReservedBitsSet` if any of RSV1-3 is set.
    pub fn validate_first_byte(&self, byte0: u8) -> Result<()> {
        self.validate_rsv_bits(byte0 & 0x40 != 0, byte0 & 0x20 != 0, byte0 & 0x10 != 0)
    }

    /// Check the MASK bit of the second header byte.
    ///
    /// # Errors
    ///
    /// See [`validate_masking`](Self::validate_masking).
    pub fn validate_second_byte(&self, byte1: u8) -> Result<()> {
        self.validate_masking(byte1 & 0x80 != 0)
    }

    /// Servers require masked frames, clients require unmasked ones.
    ///
    /// # Errors
    ///
    /// `Error::UnmaskedClientFrame` or `Error::MaskedServerFrame`.
    fn validate_masking(&self, masked: bool) -> Result<()> {
        match (masked, self.role.expects_masked()) {
            (false, true) => Err(Error::UnmaskedClientFrame),
            (true, false) => Err(Error::MaskedServerFrame),
            _ => Ok(()),
        }
    }

    /// RSV bits MUST be 0; no extension that defines them is negotiated.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReservedBitsSet` if any bit is set.
    fn validate_rsv_bits(&self, rsv1: bool, rsv2: bool, rsv3: bool) -> Result<()> {
        if rsv1 || rsv2 || rsv3 {
            return Err(Error::ReservedBitsSet);
        }
        Ok(())
    }

    /// Check a declared payload length against the effective read limit.
    ///
    /// # Errors
    ///
    /// Returns `Error::FrameTooLarge` if `payload_len` exceeds it.
    pub fn validate_frame_size(&self, payload_len: u64) -> Result<()> {
        let max = self.max_payload();
        if payload_len > max {
            return Err(Error::FrameTooLarge {
                size: payload_len,
                max,
            });
        }
        Ok(())
    }
}
