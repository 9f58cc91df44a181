//! The host bridge: out-of-circuit services for the evaluator.
//!
//! The evaluator is pure field arithmetic except where it needs data only
//! the host can supply (nondeterministic witness values). Those requests go
//! through a named call with in/out argument slices; the set of names and
//! their arities is part of the arithmetization ABI.

use serde::{Deserialize, Serialize};

use rvzk_primitives::Fp;

use crate::error::CircuitError;

/// Host call: next memory event in (address, cycle) order.
/// No inputs; five outputs: cycle, word address, is-write, value low half,
/// value high half.
pub const HOST_MEM_CHECK: &str = "memCheck";

/// A capability object serving host calls by name.
pub trait HostBridge {
    fn call(
        &mut self,
        name: &str,
        extra: &str,
        in_args: &[Fp],
        out_args: &mut [Fp],
    ) -> Result<(), CircuitError>;
}

/// One word-granular memory access observed during execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemEvent {
    /// Trace row on which the access happened.
    pub cycle: u32,
    /// Word address (byte address / 4), so deltas fit 24 bits.
    pub addr: u32,
    /// Whether the access wrote the word.
    pub is_write: bool,
    /// The word value after the access.
    pub value: u32,
}

/// The standard bridge: serves `memCheck` from the execution's memory
/// events, presorted by (address, cycle).
pub struct MemCheckBridge {
    events: Vec<MemEvent>,
    next: usize,
}

impl MemCheckBridge {
    pub fn new(mut events: Vec<MemEvent>) -> Self {
        events.sort_by_key(|e| (e.addr, e.cycle));
        Self { events, next: 0 }
    }

    /// Events not yet handed out. Zero after a complete sweep.
    pub fn remaining(&self) -> usize {
        self.events.len() - self.next
    }
}

impl HostBridge for MemCheckBridge {
    fn call(
        &mut self,
        name: &str,
        _extra: &str,
        in_args: &[Fp],
        out_args: &mut [Fp],
    ) -> Result<(), CircuitError> {
        match name {
            HOST_MEM_CHECK => {
                if !in_args.is_empty() || out_args.len() != 5 {
                    return Err(CircuitError::BridgeError(format!(
                        "memCheck arity mismatch: {} in, {} out",
                        in_args.len(),
                        out_args.len()
                    )));
                }
                let event = self.events.get(self.next).ok_or_else(|| {
                    CircuitError::BridgeError("memCheck: event list exhausted".into())
                })?;
                self.next += 1;
                out_args[0] = Fp::new(event.cycle);
                out_args[1] = Fp::new(event.addr);
                out_args[2] = Fp::new(event.is_write as u32);
                out_args[3] = Fp::new(event.value & 0xffff);
                out_args[4] = Fp::new(event.value >> 16);
                Ok(())
            }
            other => Err(CircuitError::UnknownHostCall(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_served_in_addr_cycle_order() {
        let mut bridge = MemCheckBridge::new(vec![
            MemEvent { cycle: 5, addr: 2, is_write: true, value: 7 },
            MemEvent { cycle: 1, addr: 9, is_write: false, value: 1 },
            MemEvent { cycle: 3, addr: 2, is_write: false, value: 7 },
        ]);

        let mut outs = [Fp::ZERO; 5];
        bridge.call(HOST_MEM_CHECK, "", &[], &mut outs).unwrap();
        assert_eq!(outs[1].as_u32(), 2);
        assert_eq!(outs[0].as_u32(), 3);
        bridge.call(HOST_MEM_CHECK, "", &[], &mut outs).unwrap();
        assert_eq!(outs[1].as_u32(), 2);
        assert_eq!(outs[0].as_u32(), 5);
        assert_eq!(outs[2].as_u32(), 1);
        bridge.call(HOST_MEM_CHECK, "", &[], &mut outs).unwrap();
        assert_eq!(outs[1].as_u32(), 9);
        assert_eq!(bridge.remaining(), 0);

        // A fourth call has nothing left to serve.
        assert!(bridge.call(HOST_MEM_CHECK, "", &[], &mut outs).is_err());
    }

    #[test]
    fn test_value_split() {
        let mut bridge = MemCheckBridge::new(vec![MemEvent {
            cycle: 1,
            addr: 1,
            is_write: true,
            value: 0xabcd_1234,
        }]);
        let mut outs = [Fp::ZERO; 5];
        bridge.call(HOST_MEM_CHECK, "", &[], &mut outs).unwrap();
        assert_eq!(outs[3].as_u32(), 0x1234);
        assert_eq!(outs[4].as_u32(), 0xabcd);
    }

    #[test]
    fn test_unknown_call() {
        let mut bridge = MemCheckBridge::new(vec![]);
        let mut outs: [Fp; 0] = [];
        assert!(matches!(
            bridge.call("shaInit", "", &[], &mut outs),
            Err(CircuitError::UnknownHostCall(_))
        ));
    }
}
