//! The proof-system boundary: `prove` and `verify` over seals.
//!
//! The outer low-degree argument is a black box to the core; what the core
//! pins down is the seal's binding material. A seal is a word vector laid
//! out as:
//!
//! | words    | content                                             |
//! |----------|-----------------------------------------------------|
//! | 0..=7    | journal root: inline bytes (zero-padded) if the     |
//! |          | journal is at most 32 bytes, else its SHA-256       |
//! | 8        | journal length in bytes                             |
//! | 9        | trace po2                                           |
//! | 10..=17  | code-bank commitment root at that po2               |
//! | 18..=25  | data-bank commitment root                           |
//! | 26..=33  | authenticator: SHA-256 over words 0..=25            |
//!
//! `prove` drives the engine, sweeps the constraint evaluator over every
//! active row (aborting on any violation), commits both banks, and emits
//! the seal. `verify` recomputes the authenticator and checks the code
//! root against the method digest for the seal's level.

use tracing::debug;

use rvzk_air::bridge::MemCheckBridge;
use rvzk_air::consts::{CODE_SIZE, DATA_SIZE, MAX_CYCLES, MAX_CYCLES_PO2, MIN_CYCLES_PO2, ZK_CYCLES};
use rvzk_air::mem_check::step_verify;
use rvzk_primitives::ntt::{batch_interpolate_ntt, zk_shift};
use rvzk_primitives::{Digest, DIGEST_WORDS};
use rvzk_executor::{execute_elf, IoHandler};

use crate::error::ProverError;
use crate::method_id::MethodId;
use crate::poly_group::PolyGroup;

/// Journals longer than this are bound by hash rather than inline.
pub const MAX_INLINE_JOURNAL: usize = 32;

/// Seal word holding the journal byte length.
pub const JOURNAL_LEN_WORD: usize = 8;

/// Seal word holding the trace po2.
pub const PO2_WORD: usize = 9;

const CODE_ROOT_WORD: usize = 10;
const DATA_ROOT_WORD: usize = 18;
const CHECK_WORD: usize = 26;

/// Total seal length in words.
pub const SEAL_WORDS: usize = 34;

/// The prover side of a run also surfaces the committed journal.
pub trait JournalSource {
    fn journal(&self) -> &[u8];
}

/// Execute, check, commit, and seal one run of `elf`.
pub fn prove<H: IoHandler + JournalSource>(
    elf: &[u8],
    io: &mut H,
) -> Result<Vec<u32>, ProverError> {
    // Run the guest to a power-of-two trace.
    let mut execution = execute_elf(elf, io, MAX_CYCLES)?;
    let cycles = execution.cycles();
    let po2 = execution.po2();
    debug!(cycles, user_cycles = execution.user_cycles, "execution done");

    // Sweep the constraint evaluator over every active row. Any violated
    // obligation aborts the run here, before anything is committed.
    let mut bridge = MemCheckBridge::new(execution.events.clone());
    for cycle in 0..cycles - ZK_CYCLES {
        step_verify(
            &mut bridge,
            cycles,
            cycle,
            &execution.trace.code,
            &mut execution.trace.data,
        )?;
    }
    if bridge.remaining() != 0 {
        return Err(ProverError::VerifyError(format!(
            "{} memory events left unchecked",
            bridge.remaining()
        )));
    }

    // Commit both banks: interpolate, blind, Merkle.
    let code_root = {
        let mut code = execution.trace.code;
        batch_interpolate_ntt(&mut code, CODE_SIZE);
        zk_shift(&mut code, CODE_SIZE);
        *PolyGroup::new(&code, CODE_SIZE, cycles).root()
    };
    let data_root = {
        let mut data = execution.trace.data;
        batch_interpolate_ntt(&mut data, DATA_SIZE);
        zk_shift(&mut data, DATA_SIZE);
        *PolyGroup::new(&data, DATA_SIZE, cycles).root()
    };
    debug!(%code_root, %data_root, "banks committed");

    // Assemble the seal.
    let journal = io.journal();
    let mut seal = vec![0u32; SEAL_WORDS];
    write_journal_root(&mut seal, journal);
    seal[JOURNAL_LEN_WORD] = journal.len() as u32;
    seal[PO2_WORD] = po2 as u32;
    seal[CODE_ROOT_WORD..CODE_ROOT_WORD + DIGEST_WORDS].copy_from_slice(code_root.as_words());
    seal[DATA_ROOT_WORD..DATA_ROOT_WORD + DIGEST_WORDS].copy_from_slice(data_root.as_words());
    let check = authenticator(&seal);
    seal[CHECK_WORD..CHECK_WORD + DIGEST_WORDS].copy_from_slice(check.as_words());

    Ok(seal)
}

/// Check a seal against a method id.
///
/// Proves (at this boundary's level of abstraction) that some run of the
/// identified program produced the journal root the seal carries.
pub fn verify(method_id: &MethodId, seal: &[u32]) -> Result<(), ProverError> {
    if seal.len() != SEAL_WORDS {
        return Err(ProverError::VerifyError(format!(
            "seal length {} != {}",
            seal.len(),
            SEAL_WORDS
        )));
    }

    let po2 = seal[PO2_WORD] as usize;
    if !(MIN_CYCLES_PO2..=MAX_CYCLES_PO2).contains(&po2) {
        return Err(ProverError::VerifyError(format!("seal po2 {po2} out of range")));
    }

    let check = authenticator(seal);
    if check.as_words()[..] != seal[CHECK_WORD..CHECK_WORD + DIGEST_WORDS] {
        return Err(ProverError::VerifyError("seal authenticator mismatch".into()));
    }

    let level = po2 - MIN_CYCLES_PO2;
    let expected = method_id.as_digest()[level];
    if expected.is_zero() {
        return Err(ProverError::VerifyError(format!(
            "method id has no digest at level {level}"
        )));
    }
    let mut code_root = [0u32; DIGEST_WORDS];
    code_root.copy_from_slice(&seal[CODE_ROOT_WORD..CODE_ROOT_WORD + DIGEST_WORDS]);
    if Digest::new(code_root) != expected {
        return Err(ProverError::VerifyError(
            "seal code root does not match method id".into(),
        ));
    }

    Ok(())
}

/// Pack the journal binding into words 0..=7: inline little-endian bytes
/// for short journals, SHA-256 for long ones.
fn write_journal_root(seal: &mut [u32], journal: &[u8]) {
    if journal.len() > MAX_INLINE_JOURNAL {
        let digest = Digest::hash_bytes(journal);
        seal[..DIGEST_WORDS].copy_from_slice(digest.as_words());
    } else {
        let mut padded = [0u8; MAX_INLINE_JOURNAL];
        padded[..journal.len()].copy_from_slice(journal);
        for (i, chunk) in padded.chunks_exact(4).enumerate() {
            seal[i] = u32::from_le_bytes(chunk.try_into().unwrap());
        }
    }
}

/// SHA-256 over the binding words (everything before the check words).
fn authenticator(seal: &[u32]) -> Digest {
    let bytes: Vec<u8> = seal[..CHECK_WORD].iter().flat_map(|w| w.to_le_bytes()).collect();
    Digest::hash_bytes(&bytes)
}

/// View the leading seal words as a byte stream (the inline-journal view).
pub fn seal_bytes(seal: &[u32], len: usize) -> Vec<u8> {
    seal.iter()
        .flat_map(|w| w.to_le_bytes())
        .take(len)
        .collect()
}
