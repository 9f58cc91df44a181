//! Executor errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Invalid ELF: {0}")]
    ElfError(String),

    #[error("{region} overflow: need {need} bytes, capacity {cap}")]
    SizeError {
        region: &'static str,
        need: usize,
        cap: usize,
    },

    #[error("Invalid instruction at pc={pc:#x}: {bits:#010x}")]
    InvalidInstruction { pc: u32, bits: u32 },

    #[error("Unaligned memory access at address {addr:#x}")]
    UnalignedAccess { addr: u32 },

    #[error("Memory access out of range: address {addr:#x}")]
    OutOfRange { addr: u32 },

    #[error("Trace would exceed the maximum cycle count ({cycles})")]
    MaxCycles { cycles: usize },
}
