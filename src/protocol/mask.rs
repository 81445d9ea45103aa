//! Payload masking (RFC 6455 Section 5.3).
//!
//! Masking XORs byte `i` with `key[i % 4]`. The transform is its own
//! inverse, so the encoder and the decoder share it.

/// Byte-by-byte XOR masking.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Word-at-a-time masking, equivalent to [`apply_mask`].
///
/// Whole 4-byte chunks start at offsets that are multiples of four, so each
/// chunk lines up with the key and can be XOR-ed as a single `u32`.
#[inline]
pub fn apply_mask_fast(data: &mut [u8], mask: [u8; 4]) {
    let mask_u32 = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ mask_u32;
        chunk.copy_from_slice(&word.to_ne_bytes());
    }
    for (byte, key) in chunks.into_remainder().iter_mut().zip(mask) {
        *byte ^= key;
    }
}
