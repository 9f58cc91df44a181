//! rvzk-air: the arithmetization ABI.
//!
//! This crate pins everything the prover and verifier must agree on at the
//! field level: the bank geometry and column assignments ([`consts`]), the
//! deterministic code-bank ROM ([`code`]), the host bridge protocol
//! ([`bridge`]), and the per-cycle constraint evaluator ([`mem_check`]).

pub mod bridge;
pub mod code;
pub mod consts;
pub mod error;
pub mod mem_check;

pub use bridge::{HostBridge, MemCheckBridge, MemEvent};
pub use error::CircuitError;
