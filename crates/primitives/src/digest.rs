//! SHA-256 digest value type.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::field::Fp;

/// Number of 32-bit words in a digest.
pub const DIGEST_WORDS: usize = 8;

/// Number of bytes in a digest.
pub const DIGEST_BYTES: usize = DIGEST_WORDS * 4;

/// A 256-bit digest as eight 32-bit words.
///
/// Words are little-endian in every serialized form. Equality is a plain
/// byte compare.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct Digest([u32; DIGEST_WORDS]);

impl Digest {
    /// Construct from eight words.
    pub const fn new(words: [u32; DIGEST_WORDS]) -> Self {
        Self(words)
    }

    /// The all-zero digest, used as the "does not fit" marker in a
    /// method digest.
    pub const fn zero() -> Self {
        Self([0; DIGEST_WORDS])
    }

    /// True iff every word is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&w| w == 0)
    }

    /// The digest words.
    pub fn as_words(&self) -> &[u32; DIGEST_WORDS] {
        &self.0
    }

    /// The digest as 32 little-endian bytes.
    pub fn as_bytes(&self) -> [u8; DIGEST_BYTES] {
        let mut out = [0u8; DIGEST_BYTES];
        for (i, word) in self.0.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// Reconstruct a digest from 32 little-endian bytes.
    pub fn from_bytes(bytes: &[u8; DIGEST_BYTES]) -> Self {
        let mut words = [0u32; DIGEST_WORDS];
        for (i, word) in words.iter_mut().enumerate() {
            *word = u32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
        }
        Self(words)
    }

    /// SHA-256 of a byte slice.
    pub fn hash_bytes(bytes: &[u8]) -> Self {
        let out = Sha256::digest(bytes);
        Self::from_bytes(out.as_slice().try_into().unwrap())
    }

    /// SHA-256 of a slice of field elements (canonical little-endian words).
    pub fn hash_fps(elems: &[Fp]) -> Self {
        let mut hasher = Sha256::new();
        for elem in elems {
            hasher.update(elem.as_u32().to_le_bytes());
        }
        Self::from_bytes(hasher.finalize().as_slice().try_into().unwrap())
    }

    /// SHA-256 of the concatenation of two digests (Merkle fold).
    pub fn hash_pair(lhs: &Digest, rhs: &Digest) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(lhs.as_bytes());
        hasher.update(rhs.as_bytes());
        Self::from_bytes(hasher.finalize().as_slice().try_into().unwrap())
    }
}

impl core::fmt::Display for Digest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for byte in self.as_bytes() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
