//! The arbitrary-precision signed integer used by secp-style builtins and hint math.
//! Conversions into [`Felt`] reduce modulo the Stark prime and never panic; conversions out of
//! `Felt` are reduction-free.

use num_bigint::BigInt;
use starknet_types_core::felt::Felt;

use crate::felt_ext::FeltExt;

/// Converts a `Felt` to a `BigInt` without reduction (the felt's canonical representative,
/// taken as a non-negative integer).
pub fn felt_to_bigint(felt: &Felt) -> BigInt {
    felt.to_signed_bigint()
}

/// Converts a `BigInt` to a `Felt`, reducing modulo the Stark prime.
pub fn bigint_to_felt(value: &BigInt) -> Felt {
    Felt::from_bigint_reducing(value)
}
