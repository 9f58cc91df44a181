//! Program identity.
//!
//! A method id is one commitment root per supported trace length: level `i`
//! covers `MIN_CYCLES * 2^i` cycles. Levels too small to hold the program
//! carry the zero digest. Verification consults only the level matching the
//! receipt's actual trace length, but the id binds all of them, so a prover
//! cannot escape its program by picking a different cycle budget.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use rvzk_air::code::{required_cycles, setup_code};
use rvzk_air::consts::{CODE_DIGEST_COUNT, CODE_SIZE, MAX_CYCLES_PO2, MIN_CYCLES, MIN_CYCLES_PO2};
use rvzk_primitives::ntt::{batch_interpolate_ntt, zk_shift};
use rvzk_primitives::{Digest, Fp, DIGEST_BYTES};

use crate::error::ProverError;
use crate::io::{ArchiveReader, ArchiveWriter, Transfer};
use crate::poly_group::PolyGroup;
use rvzk_executor::elf::load_elf;
use rvzk_executor::platform::MEM_SIZE;

/// The per-level digests, for internal use in verification.
pub type MethodDigest = [Digest; CODE_DIGEST_COUNT];

/// Serialized method-id size: digest-count x 32 bytes, no framing.
pub const METHOD_ID_BYTES: usize = CODE_DIGEST_COUNT * DIGEST_BYTES;

/// An intentionally opaque program identity.
///
/// Callers get byte equality and (de)serialization; the digest layout is
/// not public API.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodId {
    #[serde(with = "serde_bytes_array")]
    bytes: [u8; METHOD_ID_BYTES],
}

impl MethodId {
    /// Compute the identity of an ELF at every supported level.
    pub fn from_elf(elf: &[u8]) -> Result<Self, ProverError> {
        Self::from_elf_bounded(elf, MAX_CYCLES_PO2)
    }

    /// Compute the identity with real digests only up to `2^max_po2`
    /// cycles; higher levels the host will never run are zeroed. A receipt
    /// whose trace fits under the bound verifies identically against the
    /// bounded and the full id.
    pub fn from_elf_bounded(elf: &[u8], max_po2: usize) -> Result<Self, ProverError> {
        let (entry, image) = load_elf(elf, MEM_SIZE)?;

        let mut digest: MethodDigest = [Digest::zero(); CODE_DIGEST_COUNT];
        for (level, slot) in digest.iter_mut().enumerate() {
            let cycles = MIN_CYCLES << level;
            if cycles < required_cycles(image.len()) {
                // The program cannot fit at this level.
                continue;
            }
            if MIN_CYCLES_PO2 + level > max_po2 {
                continue;
            }
            *slot = code_commitment(entry, &image, cycles);
            debug!(level, cycles, root = %slot, "code digest");
        }
        Ok(Self::from_digest(&digest))
    }

    /// Compute the identity of an ELF file.
    pub fn from_elf_file(path: impl AsRef<Path>) -> Result<Self, ProverError> {
        let contents = std::fs::read(path)?;
        Self::from_elf(&contents)
    }

    pub fn from_digest(digest: &MethodDigest) -> Self {
        let mut bytes = [0u8; METHOD_ID_BYTES];
        for (i, entry) in digest.iter().enumerate() {
            bytes[i * DIGEST_BYTES..(i + 1) * DIGEST_BYTES].copy_from_slice(&entry.as_bytes());
        }
        Self { bytes }
    }

    /// Reconstruct an id from its serialized bytes; the count must be
    /// exact.
    pub fn from_id_bytes(bytes: &[u8]) -> Result<Self, ProverError> {
        if bytes.len() != METHOD_ID_BYTES {
            return Err(ProverError::IdError {
                expected: METHOD_ID_BYTES,
                actual: bytes.len(),
            });
        }
        let mut out = [0u8; METHOD_ID_BYTES];
        out.copy_from_slice(bytes);
        Ok(Self { bytes: out })
    }

    pub fn as_digest(&self) -> MethodDigest {
        let mut digest = [Digest::zero(); CODE_DIGEST_COUNT];
        for (i, entry) in digest.iter_mut().enumerate() {
            let chunk: &[u8; DIGEST_BYTES] = self.bytes
                [i * DIGEST_BYTES..(i + 1) * DIGEST_BYTES]
                .try_into()
                .unwrap();
            *entry = Digest::from_bytes(chunk);
        }
        digest
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl core::fmt::Debug for MethodId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // The first digest is enough to tell ids apart in logs.
        write!(f, "MethodId({})", self.as_digest()[0])
    }
}

impl Transfer for MethodId {
    fn write(&self, ar: &mut ArchiveWriter<'_>) {
        ar.transfer_bytes(&self.bytes);
    }

    fn read(ar: &mut ArchiveReader<'_>) -> Result<Self, ProverError> {
        let mut bytes = [0u8; METHOD_ID_BYTES];
        ar.transfer_bytes(&mut bytes)?;
        Ok(Self { bytes })
    }
}

/// The commitment root of the code bank at one cycle count: set up the
/// ROM, interpolate each column, apply the ZK shift, and take the Merkle
/// root of the coefficients.
pub fn code_commitment(entry: u32, image: &BTreeMap<u32, u32>, cycles: usize) -> Digest {
    let mut code = vec![Fp::ZERO; CODE_SIZE * cycles];
    setup_code(&mut code, cycles, entry, image);
    batch_interpolate_ntt(&mut code, CODE_SIZE);
    zk_shift(&mut code, CODE_SIZE);
    *PolyGroup::new(&code, CODE_SIZE, cycles).root()
}

/// Fixed-size byte-array serde support (serde stops deriving at 32).
mod serde_bytes_array {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let vec = <Vec<u8>>::deserialize(deserializer)?;
        vec.try_into()
            .map_err(|_| D::Error::custom("bad method id length"))
    }
}
