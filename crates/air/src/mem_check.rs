//! Per-cycle memory-consistency evaluation.
//!
//! Both the prover and the verifier run this function over every active row.
//! It pulls the row's memory event from the host bridge, fills the witness
//! hole columns, and discharges the eqz obligations that make the event
//! stream a legal memory history: events sorted by (address, cycle), reads
//! returning the previously recorded value, and every delta proven to fit
//! 24 bits by a twelve-limb base-4 decomposition.
//!
//! The body deliberately stays straight-line arithmetic over the banks (the
//! upstream form of this code is emitted by a generator); all column
//! indices and constants here are ABI and must not drift.

use rvzk_primitives::Fp;

use crate::bridge::{HostBridge, HOST_MEM_CHECK};
use crate::consts::{code_col, data_col};
use crate::error::CircuitError;

/// 4^-1 mod P; peels one base-4 limb per step.
const INV_4: u32 = 1509949441;

/// (2^24)^-1 mod P; normalizes the recomposition check.
const INV_2_POW_24: u32 = 2013265801;

#[inline]
fn eqz(val: Fp, loc: &'static str) -> Result<(), CircuitError> {
    if val.eqz() {
        Ok(())
    } else {
        Err(CircuitError::ConstraintViolation { loc })
    }
}

#[inline]
fn get(bank: &[Fp], steps: usize, col: usize, cycle: usize, back: usize) -> Fp {
    let mask = steps - 1;
    bank[col * steps + (cycle.wrapping_sub(back) & mask)]
}

#[inline]
fn set(bank: &mut [Fp], steps: usize, col: usize, cycle: usize, val: Fp) {
    bank[col * steps + cycle] = val;
}

/// Write the twelve 2-bit limbs of `value` into the hole columns and check
/// that they recompose to it, i.e. that `value` fits 24 bits.
fn set_part_exact(
    data: &mut [Fp],
    steps: usize,
    cycle: usize,
    value: Fp,
    loc: &'static str,
) -> Result<(), CircuitError> {
    let three = Fp::new(3);
    let inv4 = Fp::new(INV_4);

    let mut rest = value;
    for limb in 0..data_col::MEMCHECK_LIMB_COUNT {
        let low = rest & three;
        set(data, steps, data_col::MEMCHECK_LIMB_BASE + limb, cycle, low);
        rest = (rest - low) * inv4;
    }

    let four = Fp::new(4);
    let mut total = Fp::ZERO;
    let mut weight = Fp::ONE;
    for limb in 0..data_col::MEMCHECK_LIMB_COUNT {
        total += get(data, steps, data_col::MEMCHECK_LIMB_BASE + limb, cycle, 0) * weight;
        weight *= four;
    }
    eqz((value - total) * Fp::new(INV_2_POW_24), loc)
}

/// Evaluate the memory-consistency gate for one row.
///
/// `code` and `data` are column-major `steps`-row banks; row indexing is
/// cyclic, so row -1 is row `steps - 1`. Fatal on any violated obligation.
pub fn step_verify(
    bridge: &mut dyn HostBridge,
    steps: usize,
    cycle: usize,
    code: &[Fp],
    data: &mut [Fp],
) -> Result<(), CircuitError> {
    debug_assert!(steps.is_power_of_two());

    // Row gate: any cycle-type selector set means this row is active.
    let row_cycle = get(code, steps, code_col::CYCLE, cycle, 0);
    let mut active = Fp::ZERO;
    for sel in 0..code_col::SELECTOR_COUNT {
        active += get(code, steps, code_col::SELECTOR_BASE + sel, cycle, 0);
    }
    if active.eqz() {
        return Ok(());
    }

    // Pull this row's memory event from the host and pin it into the holes.
    let mut outs = [Fp::ZERO; 5];
    bridge.call(HOST_MEM_CHECK, "", &[], &mut outs)?;
    set(data, steps, data_col::MEMCHECK_CYCLE, cycle, outs[0]);
    set(data, steps, data_col::MEMCHECK_ADDR, cycle, outs[1]);
    set(data, steps, data_col::MEMCHECK_IS_WRITE, cycle, outs[2]);
    set(data, steps, data_col::MEMCHECK_VALUE_LO, cycle, outs[3]);
    set(data, steps, data_col::MEMCHECK_VALUE_HI, cycle, outs[4]);

    // Pairwise ordering checks need a predecessor; row zero has none.
    if !row_cycle.eqz() {
        let addr_now = get(data, steps, data_col::MEMCHECK_ADDR, cycle, 0);
        let addr_prev = get(data, steps, data_col::MEMCHECK_ADDR, cycle, 1);

        let same_addr = if (addr_now - addr_prev).eqz() {
            Fp::ONE
        } else {
            Fp::ZERO
        };
        set(data, steps, data_col::MEMCHECK_SAME_ADDR, cycle, same_addr);

        let flag = get(data, steps, data_col::MEMCHECK_SAME_ADDR, cycle, 0);
        if !flag.eqz() {
            // Same address as the previous event.
            eqz(addr_now - addr_prev, "membus: same-address pair with differing address")?;

            let is_write = get(data, steps, data_col::MEMCHECK_IS_WRITE, cycle, 0);
            if !(Fp::ONE - is_write).eqz() {
                // A read must reproduce the previous value, both halves.
                let lo_now = get(data, steps, data_col::MEMCHECK_VALUE_LO, cycle, 0);
                let lo_prev = get(data, steps, data_col::MEMCHECK_VALUE_LO, cycle, 1);
                eqz(lo_now - lo_prev, "membus: read low half differs from last value")?;
                let hi_now = get(data, steps, data_col::MEMCHECK_VALUE_HI, cycle, 0);
                let hi_prev = get(data, steps, data_col::MEMCHECK_VALUE_HI, cycle, 1);
                eqz(hi_now - hi_prev, "membus: read high half differs from last value")?;
            }

            // Cycles strictly increase within an address.
            let cyc_now = get(data, steps, data_col::MEMCHECK_CYCLE, cycle, 0);
            let cyc_prev = get(data, steps, data_col::MEMCHECK_CYCLE, cycle, 1);
            set_part_exact(
                data,
                steps,
                cycle,
                cyc_now - cyc_prev - Fp::ONE,
                "membus: cycle delta out of range",
            )?;
        } else {
            // Address strictly increased.
            set_part_exact(
                data,
                steps,
                cycle,
                addr_now - addr_prev - Fp::ONE,
                "membus: address delta out of range",
            )?;
        }
    }

    // Booleanity of every helper written above (zeros on row zero).
    let flag = get(data, steps, data_col::MEMCHECK_SAME_ADDR, cycle, 0);
    eqz(flag * (flag - Fp::ONE), "membus: same-address flag not a bit")?;

    let one = Fp::ONE;
    let two = Fp::new(2);
    let three = Fp::new(3);
    for limb in 0..data_col::MEMCHECK_LIMB_COUNT {
        let d = get(data, steps, data_col::MEMCHECK_LIMB_BASE + limb, cycle, 0);
        eqz(
            d * (d - one) * (d - two) * (d - three),
            "membus: delta limb not two bits",
        )?;
    }

    Ok(())
}
