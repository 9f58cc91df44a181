//! rvzk-primitives: field arithmetic, digests, and NTT kernels.
//!
//! This crate holds the math the rest of the workspace builds on:
//! - [`Fp`]: the Baby Bear prime field (p = 2013265921)
//! - [`Digest`]: SHA-256 digests as eight little-endian words
//! - [`ntt`]: inverse NTT and ZK coset shift for commitment pipelines

pub mod digest;
pub mod field;
pub mod ntt;

pub use digest::{Digest, DIGEST_BYTES, DIGEST_WORDS};
pub use field::Fp;
