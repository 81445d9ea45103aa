//! Injectable random sources for handshake nonces and frame mask keys.
//!
//! Every [`Dialer`](crate::Dialer), [`Upgrader`](crate::Upgrader) and
//! connection owns its own source; nothing is shared process-wide. Tests can
//! pass a closure `FnMut(&mut [u8])` to get deterministic bytes.

use std::time::{SystemTime, UNIX_EPOCH};

/// A source of random bytes.
pub trait RandomSource: Send {
    /// Fill `dest` entirely with random bytes.
    fn fill_bytes(&mut self, dest: &mut [u8]);

    /// Fresh 4-byte mask key.
    fn mask_key(&mut self) -> [u8; 4] {
        let mut key = [0u8; 4];
        self.fill_bytes(&mut key);
        key
    }
}

impl<F> RandomSource for F
where
    F: FnMut(&mut [u8]) + Send,
{
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self(dest);
    }
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x1234_5678)
}

/// Operating-system randomness. Used for handshake nonces.
///
/// Falls back to a time-seeded [`MaskRng`] if the OS source is unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if getrandom::getrandom(dest).is_err() {
            tracing::warn!("OS random source unavailable, falling back to time seed");
            MaskRng::from_seed(time_seed()).fill_bytes(dest);
        }
    }
}

/// Fast generator for per-frame mask keys, seeded once from the OS.
///
/// Masking only needs keys the peer's intermediaries cannot predict ahead of
/// time, not cryptographic strength, so one OS read per connection suffices.
#[derive(Debug, Clone)]
pub struct MaskRng {
    state: u64,
}

impl MaskRng {
    /// Seed from the operating system.
    #[must_use]
    pub fn new() -> Self {
        let mut buf = [0u8; 8];
        let seed = if getrandom::getrandom(&mut buf).is_ok() {
            u64::from_le_bytes(buf)
        } else {
            time_seed()
        };
        Self::from_seed(seed)
    }

    /// Deterministic generator, for reproducible tests and benchmarks.
    #[must_use]
    pub const fn from_seed(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let a = self.state as u32 ^ (self.state >> 32) as u32;
        let b = a.wrapping_mul(0x85EB_CA6B);
        let c = b ^ (b >> 13);
        let d = c.wrapping_mul(0xC2B2_AE35);
        d ^ (d >> 16)
    }
}

impl Default for MaskRng {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for MaskRng {
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let word = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }
}
