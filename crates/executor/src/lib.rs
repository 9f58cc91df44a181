//! rvzk-executor: deterministic RISC-V RV32IM execution with witness
//! trace emission.
//!
//! This crate provides:
//! - an ELF loader producing the canonical word image ([`elf`])
//! - the guest address-space layout ([`platform`])
//! - a minimal RV32IM CPU (no MMU, no privileged modes) ([`cpu`])
//! - the execution engine that drives a guest to a power-of-two trace and
//!   services host I/O ([`engine`])

pub mod cpu;
pub mod decode;
pub mod elf;
pub mod engine;
pub mod error;
pub mod memory;
pub mod platform;
pub mod trace;

pub use cpu::Cpu;
pub use engine::{execute_elf, Execution, IoHandler, KeyStore};
pub use error::ExecutorError;
pub use memory::MemoryState;
pub use trace::Trace;
