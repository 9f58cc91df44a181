//! Number-theoretic transforms over Baby Bear.
//!
//! The code matrix is committed in coefficient form: each column is
//! interpolated by an inverse NTT and then blinded by a coset shift before
//! being fed to the Merkle commitment. Sizes are powers of two up to 2^27.

use rayon::prelude::*;

use crate::field::Fp;

/// Largest supported transform: 2^27 (the full torsion of the field).
pub const MAX_ROU_PO2: usize = 27;

/// Forward roots of unity: `ROU_FWD[i]` has multiplicative order 2^i.
///
/// Derived from the generator 31 of the multiplicative group;
/// `ROU_FWD[27] = 31^15 mod P`.
pub const ROU_FWD: [u32; MAX_ROU_PO2 + 1] = [
    1, 2013265920, 1728404513, 1592366214, 196396260, 760005850, 1721589904, 397765732, 1732600167,
    1753498361, 341742893, 1340477990, 1282623253, 298008106, 1657000625, 2009781145, 1421947380,
    1286330022, 1559589183, 1049899240, 195061667, 414040701, 570250684, 1267047229, 1003846038,
    1149491290, 975630072, 440564289,
];

/// Inverse roots of unity: `ROU_REV[i] = ROU_FWD[i]^-1`.
pub const ROU_REV: [u32; MAX_ROU_PO2 + 1] = [
    1, 2013265920, 284861408, 1801542727, 567209306, 1273220281, 662200255, 1856545343, 1611842161,
    1861675199, 774513262, 449056851, 1255670133, 1976924129, 106301669, 1411306935, 1540942033,
    1043440885, 173207512, 463443832, 1021415956, 1574319791, 953617870, 987386499, 1469248932,
    165179394, 1498740239, 1713844692,
];

/// The coset (shift) generator used by the ZK blinding.
pub const SHIFT_GENERATOR: u32 = 3;

/// In-place bit-reversal permutation.
fn bit_reverse(data: &mut [Fp]) {
    let n = data.len();
    debug_assert!(n.is_power_of_two());
    if n < 2 {
        return;
    }
    let shift = n.leading_zeros() + 1;
    for i in 0..n {
        let j = i.reverse_bits() >> shift;
        if i < j {
            data.swap(i, j);
        }
    }
}

/// Core radix-2 butterfly pass over bit-reversed input.
fn ntt_core(data: &mut [Fp], rou: &[u32; MAX_ROU_PO2 + 1]) {
    let n = data.len();
    let po2 = n.trailing_zeros() as usize;
    assert!(po2 <= MAX_ROU_PO2, "transform size 2^{po2} exceeds field torsion");
    bit_reverse(data);
    for stage in 1..=po2 {
        let half = 1 << (stage - 1);
        let step_root = Fp::new(rou[stage]);
        for block in data.chunks_exact_mut(half * 2) {
            let (lo, hi) = block.split_at_mut(half);
            let mut w = Fp::ONE;
            for (a, b) in lo.iter_mut().zip(hi.iter_mut()) {
                let t = *b * w;
                *b = *a - t;
                *a += t;
                w *= step_root;
            }
        }
    }
}

/// Forward NTT: coefficients to evaluations over the 2^k roots of unity.
pub fn evaluate_ntt(data: &mut [Fp]) {
    ntt_core(data, &ROU_FWD);
}

/// Inverse NTT: evaluations to coefficients, including the 1/n scale.
pub fn interpolate_ntt(data: &mut [Fp]) {
    ntt_core(data, &ROU_REV);
    let scale = Fp::new(data.len() as u32).inv();
    for elem in data.iter_mut() {
        *elem *= scale;
    }
}

/// Column-wise batch interpolation of a column-major `rows x count` matrix.
///
/// Columns are independent; the work parallelizes across them without
/// affecting the (deterministic) output.
pub fn batch_interpolate_ntt(matrix: &mut [Fp], count: usize) {
    assert_eq!(matrix.len() % count, 0);
    matrix
        .par_chunks_exact_mut(matrix.len() / count)
        .for_each(interpolate_ntt);
}

/// Apply the ZK coset shift to a column-major coefficient matrix.
///
/// Coefficient row `r` of column `c` is multiplied by `g^r * h_c` where
/// `g` is [`SHIFT_GENERATOR`] and `h_c = g^c` is the per-column shift.
pub fn zk_shift(matrix: &mut [Fp], count: usize) {
    assert_eq!(matrix.len() % count, 0);
    let rows = matrix.len() / count;
    let g = Fp::new(SHIFT_GENERATOR);
    matrix
        .par_chunks_exact_mut(rows)
        .enumerate()
        .for_each(|(col, column)| {
            let mut cur = g.pow(col as u32);
            for coeff in column.iter_mut() {
                *coeff *= cur;
                cur *= g;
            }
        });
}
