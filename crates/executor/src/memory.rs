//! Sparse word-addressed guest memory.
//!
//! Memory is a map from 4-aligned byte address to 32-bit word; untouched
//! words read as zero. Sub-word accesses are carried by their containing
//! word, which is also the granularity of the memory-consistency argument:
//! a byte store is, as far as the trace is concerned, a read-modify-write of
//! one word.
//!
//! Alignment is strict: word accesses must be 4-aligned and halfword
//! accesses 2-aligned. An unaligned access is an unprovable trap and aborts
//! execution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ExecutorError;
use crate::platform::MEM_SIZE;

/// Guest memory state.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct MemoryState {
    words: BTreeMap<u32, u32>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn check_range(addr: u32) -> Result<(), ExecutorError> {
        if addr >= MEM_SIZE {
            return Err(ExecutorError::OutOfRange { addr });
        }
        Ok(())
    }

    /// Load a word from a 4-aligned address.
    #[inline]
    pub fn load(&self, addr: u32) -> Result<u32, ExecutorError> {
        if addr & 3 != 0 {
            return Err(ExecutorError::UnalignedAccess { addr });
        }
        Self::check_range(addr)?;
        Ok(self.words.get(&addr).copied().unwrap_or(0))
    }

    /// Store a word to a 4-aligned address.
    #[inline]
    pub fn store(&mut self, addr: u32, word: u32) -> Result<(), ExecutorError> {
        if addr & 3 != 0 {
            return Err(ExecutorError::UnalignedAccess { addr });
        }
        Self::check_range(addr)?;
        self.words.insert(addr, word);
        Ok(())
    }

    /// Load a byte. The access is served by the containing word.
    #[inline]
    pub fn load_u8(&self, addr: u32) -> Result<u8, ExecutorError> {
        Self::check_range(addr)?;
        let word = self.words.get(&(addr & !3)).copied().unwrap_or(0);
        Ok((word >> ((addr & 3) * 8)) as u8)
    }

    /// Load a halfword from a 2-aligned address.
    #[inline]
    pub fn load_u16(&self, addr: u32) -> Result<u16, ExecutorError> {
        if addr & 1 != 0 {
            return Err(ExecutorError::UnalignedAccess { addr });
        }
        Self::check_range(addr)?;
        let word = self.words.get(&(addr & !3)).copied().unwrap_or(0);
        Ok((word >> ((addr & 2) * 8)) as u16)
    }

    /// Store a byte via read-modify-write of the containing word.
    /// Returns the resulting word value.
    #[inline]
    pub fn store_u8(&mut self, addr: u32, val: u8) -> Result<u32, ExecutorError> {
        Self::check_range(addr)?;
        let shift = (addr & 3) * 8;
        let entry = self.words.entry(addr & !3).or_insert(0);
        *entry = (*entry & !(0xff << shift)) | ((val as u32) << shift);
        Ok(*entry)
    }

    /// Store a halfword via read-modify-write of the containing word.
    /// Returns the resulting word value.
    #[inline]
    pub fn store_u16(&mut self, addr: u32, val: u16) -> Result<u32, ExecutorError> {
        if addr & 1 != 0 {
            return Err(ExecutorError::UnalignedAccess { addr });
        }
        Self::check_range(addr)?;
        let shift = (addr & 2) * 8;
        let entry = self.words.entry(addr & !3).or_insert(0);
        *entry = (*entry & !(0xffff << shift)) | ((val as u32) << shift);
        Ok(*entry)
    }

    /// Copy `len` bytes starting at `start` into a fresh buffer.
    /// Used by the host to drain the Output and Commit regions.
    pub fn read_bytes(&self, start: u32, len: usize) -> Result<Vec<u8>, ExecutorError> {
        let mut out = Vec::with_capacity(len);
        for i in 0..len as u32 {
            out.push(self.load_u8(start + i)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_store_word() {
        let mut mem = MemoryState::new();
        mem.store(0x100, 0xdead_beef).unwrap();
        assert_eq!(mem.load(0x100).unwrap(), 0xdead_beef);
        // Untouched words read as zero.
        assert_eq!(mem.load(0x104).unwrap(), 0);
    }

    #[test]
    fn test_unaligned_word_access() {
        let mut mem = MemoryState::new();
        assert!(matches!(
            mem.load(0x101),
            Err(ExecutorError::UnalignedAccess { addr: 0x101 })
        ));
        assert!(mem.store(0x102, 1).is_err());
    }

    #[test]
    fn test_out_of_range() {
        let mem = MemoryState::new();
        assert!(matches!(
            mem.load(MEM_SIZE),
            Err(ExecutorError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_sub_word_access() {
        let mut mem = MemoryState::new();
        mem.store(0x200, 0x4433_2211).unwrap();
        assert_eq!(mem.load_u8(0x200).unwrap(), 0x11);
        assert_eq!(mem.load_u8(0x203).unwrap(), 0x44);
        assert_eq!(mem.load_u16(0x200).unwrap(), 0x2211);
        assert_eq!(mem.load_u16(0x202).unwrap(), 0x4433);

        let word = mem.store_u8(0x201, 0xff).unwrap();
        assert_eq!(word, 0x4433_ff11);
        let word = mem.store_u16(0x202, 0xaabb).unwrap();
        assert_eq!(word, 0xaabb_ff11);
    }

    #[test]
    fn test_unaligned_halfword() {
        let mut mem = MemoryState::new();
        assert!(mem.load_u16(0x201).is_err());
        assert!(mem.store_u16(0x203, 1).is_err());
    }

    #[test]
    fn test_read_bytes() {
        let mut mem = MemoryState::new();
        mem.store(0x300, u32::from_le_bytes([1, 2, 3, 4])).unwrap();
        mem.store(0x304, u32::from_le_bytes([5, 6, 7, 8])).unwrap();
        assert_eq!(mem.read_bytes(0x301, 5).unwrap(), vec![2, 3, 4, 5, 6]);
    }
}
