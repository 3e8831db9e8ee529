//! Extension operations on [`Felt`] needed by the core that are not part of
//! `starknet-types-core`'s own API: saturating shifts, canonical bitwise operators, the
//! Legendre symbol, and Felt <-> [`BigInt`] conversions that never panic.
//!
//! `Felt` itself (add/sub/mul/neg/inverse/pow/from_bytes/to_bytes/equality) is used directly
//! from `starknet_types_core::felt::Felt`; this module only adds what's needed on top of it.

use num_bigint::{BigInt, BigUint};
use starknet_types_core::felt::{Felt, NonZeroFelt};

use crate::error::MathError;

/// The Stark prime, `2^251 + 17 * 2^192 + 1`.
pub fn stark_prime() -> BigUint {
    Felt::MAX.to_biguint() + BigUint::from(1u8)
}

/// Extension trait implementing felt operations not already covered by `starknet-types-core`.
pub trait FeltExt: Sized {
    fn checked_inv(&self) -> Result<Self, MathError>;
    fn shl_saturating(&self, bits: u32) -> Self;
    fn shr_saturating(&self, bits: u32) -> Self;
    fn bitand(&self, rhs: &Self) -> Self;
    fn bitor(&self, rhs: &Self) -> Self;
    fn bitxor(&self, rhs: &Self) -> Self;
    fn num_bits(&self) -> u32;
    fn is_zero_felt(&self) -> bool;
    /// Legendre symbol of `self` modulo the Stark prime: `0`, `1`, or `-1` (returned as `Felt`).
    fn legendre(&self) -> Self;
    fn to_signed_bigint(&self) -> BigInt;
    fn from_bigint_reducing(value: &BigInt) -> Self;
}

impl FeltExt for Felt {
    fn checked_inv(&self) -> Result<Self, MathError> {
        self.inverse().ok_or(MathError::DivisionByZero)
    }

    fn shl_saturating(&self, bits: u32) -> Self {
        let value = self.to_biguint() << bits;
        let prime = stark_prime();
        if value >= prime {
            Felt::ZERO
        } else {
            Felt::from(value)
        }
    }

    fn shr_saturating(&self, bits: u32) -> Self {
        let value = self.to_biguint() >> bits;
        Felt::from(value)
    }

    fn bitand(&self, rhs: &Self) -> Self {
        Felt::from(self.to_biguint() & rhs.to_biguint())
    }

    fn bitor(&self, rhs: &Self) -> Self {
        Felt::from(self.to_biguint() | rhs.to_biguint())
    }

    fn bitxor(&self, rhs: &Self) -> Self {
        Felt::from(self.to_biguint() ^ rhs.to_biguint())
    }

    fn num_bits(&self) -> u32 {
        self.bits() as u32
    }

    fn is_zero_felt(&self) -> bool {
        self == &Felt::ZERO
    }

    fn legendre(&self) -> Self {
        if self.is_zero_felt() {
            return Felt::ZERO;
        }
        let prime = stark_prime();
        let exponent: BigUint = (&prime - BigUint::from(1u8)) / BigUint::from(2u8);
        let result = self.to_biguint().modpow(&exponent, &prime);
        if result == BigUint::from(1u8) {
            Felt::ONE
        } else {
            -Felt::ONE
        }
    }

    fn to_signed_bigint(&self) -> BigInt {
        self.to_bigint()
    }

    fn from_bigint_reducing(value: &BigInt) -> Self {
        // `Felt::from(&BigInt)` already reduces modulo the Stark prime (it takes the
        // magnitude and negates in-field for negative inputs), so no manual reduction here.
        Felt::from(value)
    }
}

/// A `Felt` divisor guaranteed non-zero, for use with `Felt::field_div`.
pub fn non_zero(value: Felt) -> Result<NonZeroFelt, MathError> {
    NonZeroFelt::try_from(value).map_err(|_| MathError::DivisionByZero)
}
