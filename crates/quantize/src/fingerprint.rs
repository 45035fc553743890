//! Packed binary fingerprint type.
//!
//! On the wire a fingerprint is a plain array of byte values (`[178, 224, ...]`), which is
//! what the search service consumes.

use serde::{Deserialize, Serialize};

/// Sign-bit fingerprint of a dense embedding, `ceil(bits / 8)` bytes long.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<u8>", into = "Vec<u8>")]
pub struct BinaryFingerprint {
    bytes: Vec<u8>,
    bits: usize,
}

impl BinaryFingerprint {
    pub(crate) fn from_packed(bytes: Vec<u8>, bits: usize) -> Self {
        debug_assert_eq!(bytes.len(), bits.div_ceil(8));
        Self { bytes, bits }
    }

    /// Wraps already-packed bytes. The bit count is taken as `8 * bytes.len()`.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let bits = bytes.len() * 8;
        Self { bytes, bits }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Number of meaningful bits (the embedding width).
    pub fn bits(&self) -> usize {
        self.bits
    }

    /// Reads bit `i` in MSB-first order. Out-of-range indices return `None`.
    pub fn bit(&self, i: usize) -> Option<bool> {
        if i >= self.bits {
            return None;
        }
        Some(self.bytes[i / 8] & (0x80 >> (i % 8)) != 0)
    }

    /// Number of differing bits. Fingerprints of different lengths compare over the
    /// shorter prefix, with every extra byte of the longer one counted in full.
    pub fn hamming_distance(&self, other: &BinaryFingerprint) -> u32 {
        let common: u32 = self
            .bytes
            .iter()
            .zip(&other.bytes)
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        let (longer, shorter) = if self.bytes.len() >= other.bytes.len() {
            (&self.bytes, &other.bytes)
        } else {
            (&other.bytes, &self.bytes)
        };
        let extra: u32 = longer[shorter.len()..].iter().map(|b| b.count_ones()).sum();
        common + extra
    }
}

impl From<Vec<u8>> for BinaryFingerprint {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<BinaryFingerprint> for Vec<u8> {
    fn from(fp: BinaryFingerprint) -> Self {
        fp.bytes
    }
}

impl AsRef<[u8]> for BinaryFingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}
