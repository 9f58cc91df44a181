//! Evaluator errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CircuitError {
    /// An eqz obligation failed. The tag names the violated constraint so
    /// that a bad trace (or a bad engine) is diagnosable.
    #[error("constraint violated: {loc}")]
    ConstraintViolation { loc: &'static str },

    /// The host bridge could not service a call.
    #[error("host bridge failure: {0}")]
    BridgeError(String),

    /// The evaluator asked for a host service nobody registered.
    #[error("unknown host call: {0}")]
    UnknownHostCall(String),
}
