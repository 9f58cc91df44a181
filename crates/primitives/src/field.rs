//! Baby Bear field arithmetic.
//!
//! The Baby Bear prime is p = 15 * 2^27 + 1 = 2013265921. The large
//! power-of-two torsion makes the field NTT-friendly up to size 2^27, which
//! comfortably covers the largest supported trace (2^24 rows).

use core::ops::{Add, AddAssign, BitAnd, Mul, MulAssign, Neg, Sub, SubAssign};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// The Baby Bear prime: 15 * 2^27 + 1.
pub const P: u32 = 2013265921;

/// A field element, stored as a canonical u32 in the range [0, P).
///
/// Every operation reduces eagerly, so equality and [`Fp::as_u32`] are
/// unambiguous. Constraint checks rely on this: a constraint holds exactly
/// when the computed element equals [`Fp::ZERO`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Fp(u32);

impl Fp {
    /// The additive identity.
    pub const ZERO: Self = Self(0);

    /// The multiplicative identity.
    pub const ONE: Self = Self(1);

    /// The prime modulus.
    pub const P: u32 = P;

    /// Create a new element, reducing if necessary.
    ///
    /// `val` may be any u32; since u32::MAX < 3 * P, two conditional
    /// subtractions reach the canonical range.
    #[inline]
    pub const fn new(val: u32) -> Self {
        let reduced = if val >= P { val - P } else { val };
        let reduced = if reduced >= P { reduced - P } else { reduced };
        Self(reduced)
    }

    /// Create from a u64, reducing mod P.
    #[inline]
    pub const fn from_u64(val: u64) -> Self {
        Self((val % P as u64) as u32)
    }

    /// Reduce a u32 that may be in [0, 2P) to [0, P).
    #[inline]
    const fn reduce(val: u32) -> u32 {
        let reduced = val.wrapping_sub(P);
        if reduced < P {
            reduced
        } else {
            val
        }
    }

    /// The canonical representative in [0, P).
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// True iff the element is the field zero.
    #[inline]
    pub const fn eqz(self) -> bool {
        self.0 == 0
    }

    /// Multiplicative inverse via Fermat's little theorem: a^(p-2).
    ///
    /// Panics if self is zero.
    #[inline]
    pub fn inv(self) -> Self {
        assert!(self.0 != 0, "cannot invert zero");
        self.pow(P - 2)
    }

    /// Exponentiation by squaring.
    #[inline]
    pub fn pow(self, mut exp: u32) -> Self {
        let mut base = self;
        let mut result = Self::ONE;
        while exp > 0 {
            if exp & 1 == 1 {
                result *= base;
            }
            base *= base;
            exp >>= 1;
        }
        result
    }

    /// Square the element.
    #[inline]
    pub fn square(self) -> Self {
        self * self
    }
}

// --- Arithmetic trait implementations ---

impl Add for Fp {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        // Both operands are < P, so the sum is < 2P and fits a u32.
        Self(Self::reduce(self.0 + rhs.0))
    }
}

impl AddAssign for Fp {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Fp {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        // Add P before subtracting to avoid underflow.
        Self(Self::reduce(self.0 + P - rhs.0))
    }
}

impl SubAssign for Fp {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul for Fp {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self(((self.0 as u64 * rhs.0 as u64) % P as u64) as u32)
    }
}

impl MulAssign for Fp {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl Neg for Fp {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        if self.0 == 0 {
            self
        } else {
            Self(P - self.0)
        }
    }
}

impl BitAnd for Fp {
    type Output = Self;

    /// Bitwise AND on the integer view.
    ///
    /// The constraint evaluator uses this to peel low bits off a canonical
    /// representative; the result is always canonical.
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl From<u32> for Fp {
    #[inline]
    fn from(val: u32) -> Self {
        Self::new(val)
    }
}

impl From<Fp> for u32 {
    #[inline]
    fn from(val: Fp) -> u32 {
        val.0
    }
}

impl core::fmt::Display for Fp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
