/// Number of bytes needed to hold `dim` sign bits.
#[inline]
pub fn fingerprint_len(dim: usize) -> usize {
    dim.div_ceil(8)
}

/// Packs the sign bits of `values` most-significant-bit first.
///
/// Bit `i` lands in byte `i / 8` at position `7 - i % 8` and is set iff `values[i] > 0`.
/// Zero, negative zero and NaN all produce a cleared bit. Trailing bits of the last byte
/// stay zero when the length is not a multiple of 8.
pub(crate) fn pack_sign_bits(values: &[f32]) -> Vec<u8> {
    let mut bytes = vec![0u8; fingerprint_len(values.len())];
    for (byte, chunk) in bytes.iter_mut().zip(values.chunks(8)) {
        for (offset, &v) in chunk.iter().enumerate() {
            if v > 0.0 {
                *byte |= 0x80 >> offset;
            }
        }
    }
    bytes
}
