//! The receipt lifecycle: prove a run, verify the artifact.

use std::path::Path;

use tracing::debug;

use rvzk_executor::engine::{IoHandler, KeyStore};
use rvzk_executor::memory::MemoryState;
use rvzk_executor::platform::INPUT;
use rvzk_executor::ExecutorError;
use rvzk_primitives::Digest;

use crate::error::ProverError;
use crate::io::{ArchiveReader, ArchiveWriter, VectorStreamWriter};
use crate::method_id::MethodId;
use crate::seal::{
    self, JournalSource, JOURNAL_LEN_WORD, MAX_INLINE_JOURNAL,
};

/// A record attesting to the correct execution of a method.
///
/// - `journal`: the bytes the guest publicly committed to
/// - `seal`: the proof words binding the journal to a method id
///
/// A receipt is immutable once constructed; it may be serialized and
/// verified any number of times.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub journal: Vec<u8>,
    pub seal: Vec<u32>,
}

impl Receipt {
    /// Verify this receipt against a method id.
    ///
    /// Checks the seal itself, then the binding between the declared
    /// journal and the seal's journal root:
    /// - the seal's journal length must equal the journal's
    /// - short journals (at most 32 bytes) must match the leading seal
    ///   bytes verbatim
    /// - longer journals must hash to the leading 32 seal bytes
    pub fn verify(&self, method_id: &MethodId) -> Result<(), ProverError> {
        seal::verify(method_id, &self.seal)?;

        if self.journal.len() as u32 != self.seal[JOURNAL_LEN_WORD] {
            return Err(ProverError::SizeError {
                journal: self.journal.len(),
                seal: self.seal[JOURNAL_LEN_WORD] as usize,
            });
        }

        let bound = if self.journal.len() > MAX_INLINE_JOURNAL {
            Digest::hash_bytes(&self.journal).as_bytes().to_vec()
                == seal::seal_bytes(&self.seal, 32)
        } else {
            self.journal == seal::seal_bytes(&self.seal, self.journal.len())
        };
        if !bound {
            return Err(ProverError::VerifyError(
                "receipt journal/seal root mismatch".into(),
            ));
        }
        Ok(())
    }

    /// Serialize: length-prefixed journal, then length-prefixed seal words.
    pub fn write(&self, ar: &mut ArchiveWriter<'_>) {
        ar.transfer_u32(self.journal.len() as u32);
        ar.transfer_bytes(&self.journal);
        ar.transfer_u32(self.seal.len() as u32);
        for &word in &self.seal {
            ar.transfer_u32(word);
        }
    }

    pub fn read(ar: &mut ArchiveReader<'_>) -> Result<Self, ProverError> {
        let journal_len = ar.transfer_u32()? as usize;
        let mut journal = vec![0u8; journal_len];
        ar.transfer_bytes(&mut journal)?;
        let seal_len = ar.transfer_u32()? as usize;
        let mut seal = Vec::with_capacity(seal_len);
        for _ in 0..seal_len {
            seal.push(ar.transfer_u32()?);
        }
        Ok(Self { journal, seal })
    }
}

/// Generates a [`Receipt`] by executing a method in the zkVM.
///
/// A prover owns its input stream, output and commit buffers, and key
/// store exclusively; two provers share nothing mutable.
pub struct Prover {
    elf: Vec<u8>,
    method_id: MethodId,
    input: VectorStreamWriter,
    output: Vec<u8>,
    commit: Vec<u8>,
    keys: KeyStore,
}

impl Prover {
    pub fn new(elf: &[u8], method_id: MethodId) -> Self {
        Self {
            elf: elf.to_vec(),
            method_id,
            input: VectorStreamWriter::new(),
            output: Vec::new(),
            commit: Vec::new(),
            keys: KeyStore::new(),
        }
    }

    pub fn from_elf_file(path: impl AsRef<Path>, method_id: MethodId) -> Result<Self, ProverError> {
        let elf = std::fs::read(path)?;
        Ok(Self::new(&elf, method_id))
    }

    /// Append input bytes, packed little-endian into words. A partial tail
    /// word is zero-padded: tail byte `i` lands at bit position `8 * i`.
    pub fn write_input(&mut self, bytes: &[u8]) {
        debug!(len = bytes.len(), "write input");
        let mut chunks = bytes.chunks_exact(4);
        for chunk in &mut chunks {
            self.input.write_word(u32::from_le_bytes(chunk.try_into().unwrap()));
        }
        let tail = chunks.remainder();
        if !tail.is_empty() {
            let mut word = 0u32;
            for (i, &byte) in tail.iter().enumerate() {
                word |= (byte as u32) << (8 * i);
            }
            self.input.write_word(word);
        }
    }

    /// Register a key for sealed-key operations inside the guest.
    pub fn set_key(&mut self, name: &str, key: &[u8]) {
        self.keys.insert(name.to_string(), key.to_vec());
    }

    /// Bytes the guest pushed through the output port during the last run.
    pub fn get_output(&self) -> &[u8] {
        &self.output
    }

    /// Bytes the guest committed during the last run.
    pub fn get_commit(&self) -> &[u8] {
        &self.commit
    }

    /// Execute the method and produce a receipt.
    ///
    /// The returned receipt has already been verified against the prover's
    /// method id; a malformed trace that somehow sealed would be caught
    /// here rather than handed to a caller.
    pub fn run(&mut self) -> Result<Receipt, ProverError> {
        self.output.clear();
        self.commit.clear();

        let mut io = ProverIo {
            input_words: &self.input.words,
            output: &mut self.output,
            commit: &mut self.commit,
            keys: &mut self.keys,
        };
        let seal = seal::prove(&self.elf, &mut io)?;

        let receipt = Receipt { journal: self.commit.clone(), seal };
        receipt.verify(&self.method_id)?;
        Ok(receipt)
    }
}

/// The prover's host handler: stages input, accumulates output and
/// journal bytes.
struct ProverIo<'a> {
    input_words: &'a [u32],
    output: &'a mut Vec<u8>,
    commit: &'a mut Vec<u8>,
    keys: &'a mut KeyStore,
}

impl IoHandler for ProverIo<'_> {
    fn on_init(&mut self, mem: &mut MemoryState) -> Result<(), ExecutorError> {
        debug!(words = self.input_words.len(), "staging input region");
        let mut addr = INPUT.start;
        for &word in self.input_words {
            if addr >= INPUT.end() {
                return Err(ExecutorError::SizeError {
                    region: "Input",
                    need: self.input_words.len() * 4,
                    cap: INPUT.len as usize,
                });
            }
            mem.store(addr, word)?;
            addr += 4;
        }
        Ok(())
    }

    fn on_write(&mut self, bytes: &[u8]) -> Result<(), ExecutorError> {
        debug!(len = bytes.len(), "guest output");
        self.output.extend_from_slice(bytes);
        Ok(())
    }

    fn on_commit(&mut self, bytes: &[u8]) -> Result<(), ExecutorError> {
        debug!(len = bytes.len(), "guest commit");
        self.commit.extend_from_slice(bytes);
        Ok(())
    }

    fn key_store(&mut self) -> &mut KeyStore {
        self.keys
    }
}

impl JournalSource for ProverIo<'_> {
    fn journal(&self) -> &[u8] {
        self.commit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_input_word_packing() {
        let elf = rvzk_executor::elf::build_test_elf(&[0u8; 4], 0x1000, 0x1000);
        let id = MethodId::from_id_bytes(&[0u8; crate::method_id::METHOD_ID_BYTES]).unwrap();
        let mut prover = Prover::new(&elf, id);

        prover.write_input(&[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(prover.input.words, vec![0x4433_2211, 0x0000_6655]);

        prover.write_input(&[0x77]);
        assert_eq!(prover.input.words[2], 0x0000_0077);
    }

    #[test]
    fn test_receipt_archive_round_trip() {
        let receipt = Receipt {
            journal: vec![1, 2, 3, 4, 5],
            seal: vec![10, 20, 30],
        };
        let mut stream = VectorStreamWriter::new();
        let mut writer = ArchiveWriter::new(&mut stream);
        receipt.write(&mut writer);
        let bytes = stream.as_bytes();

        let mut reader = ArchiveReader::new(&bytes);
        let back = Receipt::read(&mut reader).unwrap();
        assert_eq!(back, receipt);
    }

    #[test]
    fn test_input_overflow_is_size_error() {
        let mut output = Vec::new();
        let mut commit = Vec::new();
        let mut keys = KeyStore::new();
        // One word more than the input region holds.
        let words = vec![0u32; (INPUT.len / 4 + 1) as usize];
        let mut io = ProverIo {
            input_words: &words,
            output: &mut output,
            commit: &mut commit,
            keys: &mut keys,
        };
        let mut mem = MemoryState::new();
        let err = io.on_init(&mut mem).unwrap_err();
        assert!(matches!(err, ExecutorError::SizeError { region: "Input", .. }));
    }
}
