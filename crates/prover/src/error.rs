//! Prover-side errors.
//!
//! Everything propagates to the top-level calls (`Prover::run`,
//! `Receipt::verify`, the CLI); nothing is recovered locally and partial
//! receipts are never returned.

use thiserror::Error;

use rvzk_air::CircuitError;
use rvzk_executor::ExecutorError;

#[derive(Debug, Error)]
pub enum ProverError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Circuit(#[from] CircuitError),

    #[error("read out of bounds: cursor {cursor} in a {len}-byte buffer")]
    OutOfBounds { cursor: usize, len: usize },

    #[error("journal size ({journal}) does not match receipt seal ({seal})")]
    SizeError { journal: usize, seal: usize },

    #[error("verification failed: {0}")]
    VerifyError(String),

    #[error("bad number of bytes in a method id: expected {expected}, got {actual}")]
    IdError { expected: usize, actual: usize },
}
