//! RISC-V ELF binary loader.
//!
//! Parses an ELF32 little-endian RISC-V image and collects the memory words
//! that loading it would write. All writes are 32-bit wide and 4-aligned; a
//! segment that cannot be expressed that way is rejected rather than loaded
//! byte-wise, because the resulting word map is hashed into the program's
//! identity and must be canonical.

use std::collections::BTreeMap;

use crate::error::ExecutorError;

/// ELF magic number: 0x7f 'E' 'L' 'F'.
const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// ELF class: 32-bit.
const ELFCLASS32: u8 = 1;

/// ELF data encoding: little-endian.
const ELFDATA2LSB: u8 = 1;

/// Current ELF version.
const EV_CURRENT: u8 = 1;

/// ELF type: executable file.
const ET_EXEC: u16 = 2;

/// ELF machine type: RISC-V.
const EM_RISCV: u16 = 243;

/// Program header type: loadable segment.
const PT_LOAD: u32 = 1;

/// ELF header size for 32-bit.
const ELF32_HEADER_SIZE: usize = 52;

/// Program header size for 32-bit.
const ELF32_PHDR_SIZE: usize = 32;

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Load an ELF image, collecting the words its PT_LOAD segments write.
///
/// Returns the entry address and a map from 4-aligned byte address to word.
/// The map's iteration order (ascending address) is what the engine and the
/// method id both consume, so a given ELF always produces the same image.
///
/// # Errors
///
/// `ElfError` if the image is malformed, is not a 32-bit little-endian
/// RISC-V executable, a segment's address or length is not 4-aligned, or a
/// write would land at or beyond `max_mem`.
pub fn load_elf(data: &[u8], max_mem: u32) -> Result<(u32, BTreeMap<u32, u32>), ExecutorError> {
    if data.len() < ELF32_HEADER_SIZE {
        return Err(ExecutorError::ElfError(format!(
            "file too small: {} bytes (need at least {})",
            data.len(),
            ELF32_HEADER_SIZE
        )));
    }

    if data[0..4] != ELF_MAGIC {
        return Err(ExecutorError::ElfError(format!(
            "invalid magic: {:02x} {:02x} {:02x} {:02x}",
            data[0], data[1], data[2], data[3]
        )));
    }
    if data[4] != ELFCLASS32 {
        return Err(ExecutorError::ElfError(format!(
            "not a 32-bit ELF (class: {})",
            data[4]
        )));
    }
    if data[5] != ELFDATA2LSB {
        return Err(ExecutorError::ElfError(format!(
            "not little-endian (encoding: {})",
            data[5]
        )));
    }
    if data[6] != EV_CURRENT {
        return Err(ExecutorError::ElfError(format!(
            "unsupported ELF version: {}",
            data[6]
        )));
    }

    let e_type = read_u16(data, 16);
    if e_type != ET_EXEC {
        return Err(ExecutorError::ElfError(format!(
            "not an executable (type: {e_type})"
        )));
    }
    let e_machine = read_u16(data, 18);
    if e_machine != EM_RISCV {
        return Err(ExecutorError::ElfError(format!(
            "not RISC-V (machine: {e_machine})"
        )));
    }

    let entry = read_u32(data, 24);
    let phoff = read_u32(data, 28) as usize;
    let phentsize = read_u16(data, 42) as usize;
    let phnum = read_u16(data, 44) as usize;

    if phentsize < ELF32_PHDR_SIZE {
        return Err(ExecutorError::ElfError(format!(
            "program header size too small: {phentsize}"
        )));
    }

    let mut image = BTreeMap::new();
    for i in 0..phnum {
        let offset = phoff + i * phentsize;
        if offset + ELF32_PHDR_SIZE > data.len() {
            return Err(ExecutorError::ElfError(format!(
                "program header {i} out of bounds (offset {offset})"
            )));
        }

        let p_type = read_u32(data, offset);
        if p_type != PT_LOAD {
            continue;
        }
        let p_offset = read_u32(data, offset + 4) as usize;
        let p_vaddr = read_u32(data, offset + 8);
        let p_filesz = read_u32(data, offset + 16);
        let p_memsz = read_u32(data, offset + 20);

        if p_vaddr % 4 != 0 {
            return Err(ExecutorError::ElfError(format!(
                "segment address {p_vaddr:#010x} is not 4-aligned"
            )));
        }
        if p_filesz % 4 != 0 {
            return Err(ExecutorError::ElfError(format!(
                "segment length {p_filesz} is not 4-aligned"
            )));
        }
        if p_memsz < p_filesz {
            return Err(ExecutorError::ElfError(format!(
                "segment at {p_vaddr:#010x} has memsz < filesz"
            )));
        }
        let file_end = p_offset
            .checked_add(p_filesz as usize)
            .ok_or_else(|| ExecutorError::ElfError("segment range overflow".into()))?;
        if file_end > data.len() {
            return Err(ExecutorError::ElfError(format!(
                "segment at {p_vaddr:#010x} data out of bounds"
            )));
        }
        let mem_end = p_vaddr
            .checked_add(p_filesz)
            .ok_or_else(|| ExecutorError::ElfError("segment address overflow".into()))?;
        if mem_end > max_mem {
            return Err(ExecutorError::ElfError(format!(
                "segment at {p_vaddr:#010x} exceeds memory (end {mem_end:#010x})"
            )));
        }

        for word_idx in 0..(p_filesz / 4) {
            let addr = p_vaddr + word_idx * 4;
            let word = read_u32(data, p_offset + (word_idx * 4) as usize);
            image.insert(addr, word);
        }
    }

    Ok((entry, image))
}

// ============================================================================
// Test ELF builders
// ============================================================================

/// Build a minimal valid ELF for a single code segment.
///
/// `code` must be a multiple of 4 bytes; the segment is loaded at
/// `load_addr` with the entry point at `entry`.
pub fn build_test_elf(code: &[u8], entry: u32, load_addr: u32) -> Vec<u8> {
    assert_eq!(code.len() % 4, 0, "test code must be word-aligned");

    let mut elf = Vec::with_capacity(ELF32_HEADER_SIZE + ELF32_PHDR_SIZE + code.len());

    // ELF header (52 bytes)
    elf.extend_from_slice(&ELF_MAGIC);
    elf.push(ELFCLASS32);
    elf.push(ELFDATA2LSB);
    elf.push(EV_CURRENT);
    elf.push(0); // OS/ABI
    elf.extend_from_slice(&[0u8; 8]); // padding
    elf.extend_from_slice(&ET_EXEC.to_le_bytes());
    elf.extend_from_slice(&EM_RISCV.to_le_bytes());
    elf.extend_from_slice(&1u32.to_le_bytes()); // e_version
    elf.extend_from_slice(&entry.to_le_bytes());
    elf.extend_from_slice(&(ELF32_HEADER_SIZE as u32).to_le_bytes()); // e_phoff
    elf.extend_from_slice(&0u32.to_le_bytes()); // e_shoff
    elf.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    elf.extend_from_slice(&(ELF32_HEADER_SIZE as u16).to_le_bytes());
    elf.extend_from_slice(&(ELF32_PHDR_SIZE as u16).to_le_bytes());
    elf.extend_from_slice(&1u16.to_le_bytes()); // e_phnum
    elf.extend_from_slice(&40u16.to_le_bytes()); // e_shentsize
    elf.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
    elf.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx

    // Program header (32 bytes)
    let code_offset = (ELF32_HEADER_SIZE + ELF32_PHDR_SIZE) as u32;
    elf.extend_from_slice(&PT_LOAD.to_le_bytes());
    elf.extend_from_slice(&code_offset.to_le_bytes());
    elf.extend_from_slice(&load_addr.to_le_bytes()); // p_vaddr
    elf.extend_from_slice(&load_addr.to_le_bytes()); // p_paddr
    elf.extend_from_slice(&(code.len() as u32).to_le_bytes()); // p_filesz
    elf.extend_from_slice(&(code.len() as u32).to_le_bytes()); // p_memsz
    elf.extend_from_slice(&0x5u32.to_le_bytes()); // p_flags: R+X
    elf.extend_from_slice(&4u32.to_le_bytes()); // p_align

    elf.extend_from_slice(code);
    elf
}

/// Byte offset of `p_vaddr` in the ELF produced by [`build_test_elf`].
/// Exposed so boundary tests can patch the segment address.
pub const TEST_ELF_VADDR_OFFSET: usize = ELF32_HEADER_SIZE + 8;

/// Byte offset of `p_filesz` in the ELF produced by [`build_test_elf`].
pub const TEST_ELF_FILESZ_OFFSET: usize = ELF32_HEADER_SIZE + 16;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MEM_SIZE;

    #[test]
    fn test_build_and_load() {
        let code = [
            0x93, 0x00, 0xa0, 0x02, // addi x1, x0, 42
            0x13, 0x00, 0x00, 0x00, // nop
        ];
        let elf = build_test_elf(&code, 0x0200_0000, 0x0200_0000);
        let (entry, image) = load_elf(&elf, MEM_SIZE).unwrap();
        assert_eq!(entry, 0x0200_0000);
        assert_eq!(image.len(), 2);
        assert_eq!(image[&0x0200_0000], 0x02a0_0093);
        assert_eq!(image[&0x0200_0004], 0x0000_0013);
    }

    #[test]
    fn test_invalid_magic() {
        let mut elf = build_test_elf(&[0u8; 4], 0x1000, 0x1000);
        elf[0] = 0xde;
        let err = load_elf(&elf, MEM_SIZE).unwrap_err();
        assert!(matches!(err, ExecutorError::ElfError(_)));
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_too_small() {
        let err = load_elf(&[0x7f, b'E', b'L', b'F'], MEM_SIZE).unwrap_err();
        assert!(err.to_string().contains("too small"));
    }

    #[test]
    fn test_wrong_machine() {
        let mut elf = build_test_elf(&[0u8; 4], 0x1000, 0x1000);
        elf[18] = 0x3e; // x86-64
        elf[19] = 0x00;
        let err = load_elf(&elf, MEM_SIZE).unwrap_err();
        assert!(err.to_string().contains("RISC-V"));
    }

    #[test]
    fn test_misaligned_segment_address() {
        let mut elf = build_test_elf(&[0u8; 8], 0x1000, 0x1000);
        elf[TEST_ELF_VADDR_OFFSET..TEST_ELF_VADDR_OFFSET + 4]
            .copy_from_slice(&0x1002u32.to_le_bytes());
        let err = load_elf(&elf, MEM_SIZE).unwrap_err();
        assert!(matches!(err, ExecutorError::ElfError(_)));
        assert!(err.to_string().contains("4-aligned"));
    }

    #[test]
    fn test_misaligned_segment_length() {
        let mut elf = build_test_elf(&[0u8; 8], 0x1000, 0x1000);
        elf[TEST_ELF_FILESZ_OFFSET..TEST_ELF_FILESZ_OFFSET + 4]
            .copy_from_slice(&6u32.to_le_bytes());
        let err = load_elf(&elf, MEM_SIZE).unwrap_err();
        assert!(err.to_string().contains("4-aligned"));
    }

    #[test]
    fn test_segment_beyond_memory() {
        let elf = build_test_elf(&[0u8; 8], MEM_SIZE - 4, MEM_SIZE - 4);
        let err = load_elf(&elf, MEM_SIZE).unwrap_err();
        assert!(err.to_string().contains("exceeds memory"));
    }

    #[test]
    fn test_image_iterates_in_address_order() {
        let code: Vec<u8> = (0..32u8).collect();
        let elf = build_test_elf(&code, 0x2000, 0x2000);
        let (_, image) = load_elf(&elf, MEM_SIZE).unwrap();
        let addrs: Vec<u32> = image.keys().copied().collect();
        let mut sorted = addrs.clone();
        sorted.sort_unstable();
        assert_eq!(addrs, sorted);
    }
}
