//! Defines [`MaybeRelocatable`], the tagged sum type stored in every memory cell.
//!
//! A cell is either a field element or a relocatable address; the two are never conflated.
//! `Relocatable + Relocatable` is structurally unrepresentable by construction.

use num_traits::ToPrimitive;
use starknet_types_core::felt::Felt;

use crate::error::MathError;
use crate::relocatable::Relocatable;

/// A value that may be stored in a memory cell: either a felt or a relocatable address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaybeRelocatable {
    Felt(Felt),
    Relocatable(Relocatable),
}

impl MaybeRelocatable {
    pub const fn from_felt(felt: Felt) -> Self {
        Self::Felt(felt)
    }

    pub const fn from_relocatable(relocatable: Relocatable) -> Self {
        Self::Relocatable(relocatable)
    }

    pub fn from_int(value: i64) -> Self {
        Self::Felt(Felt::from(value))
    }

    pub fn into_felt(self) -> Result<Felt, MathError> {
        match self {
            Self::Felt(f) => Ok(f),
            Self::Relocatable(_) => Err(MathError::TypeMismatchNotFelt),
        }
    }

    pub fn as_felt(&self) -> Result<&Felt, MathError> {
        match self {
            Self::Felt(f) => Ok(f),
            Self::Relocatable(_) => Err(MathError::TypeMismatchNotFelt),
        }
    }

    pub fn into_relocatable(self) -> Result<Relocatable, MathError> {
        match self {
            Self::Relocatable(r) => Ok(r),
            Self::Felt(_) => Err(MathError::TypeMismatchNotRelocatable),
        }
    }

    pub fn as_relocatable(&self) -> Result<&Relocatable, MathError> {
        match self {
            Self::Relocatable(r) => Ok(r),
            Self::Felt(_) => Err(MathError::TypeMismatchNotRelocatable),
        }
    }

    pub const fn is_relocatable(&self) -> bool {
        matches!(self, Self::Relocatable(_))
    }

    /// `Felt + Felt -> Felt`, `Relocatable + Felt -> Relocatable`. `Relocatable + Relocatable`
    /// is forbidden.
    pub fn add(&self, rhs: &Self) -> Result<Self, MathError> {
        match (self, rhs) {
            (Self::Felt(a), Self::Felt(b)) => Ok(Self::Felt(*a + *b)),
            (Self::Relocatable(a), Self::Felt(b)) => Ok(Self::Relocatable(a.add_felt(b)?)),
            (Self::Felt(a), Self::Relocatable(b)) => Ok(Self::Relocatable(b.add_felt(a)?)),
            (Self::Relocatable(_), Self::Relocatable(_)) => Err(MathError::RelocatableAdd),
        }
    }

    /// `self - rhs`. Felt - Felt -> Felt. Relocatable - Felt -> Relocatable.
    /// Relocatable - Relocatable -> Felt (only within the same segment).
    pub fn sub(&self, rhs: &Self) -> Result<Self, MathError> {
        match (self, rhs) {
            (Self::Felt(a), Self::Felt(b)) => Ok(Self::Felt(*a - *b)),
            (Self::Relocatable(a), Self::Felt(b)) => {
                let delta = b.to_usize().ok_or(MathError::OffsetExceeded)?;
                Ok(Self::Relocatable(a.sub_uint(delta)?))
            }
            (Self::Relocatable(a), Self::Relocatable(b)) => {
                Ok(Self::Felt(Felt::from(a.sub(b)?)))
            }
            (Self::Felt(_), Self::Relocatable(_)) => Err(MathError::NotImplementedCellArith),
        }
    }

    /// Only `Felt * Felt` is defined.
    pub fn mul(&self, rhs: &Self) -> Result<Self, MathError> {
        match (self, rhs) {
            (Self::Felt(a), Self::Felt(b)) => Ok(Self::Felt(*a * *b)),
            _ => Err(MathError::NotImplementedCellArith),
        }
    }
}

impl From<Felt> for MaybeRelocatable {
    fn from(value: Felt) -> Self {
        Self::Felt(value)
    }
}

impl From<Relocatable> for MaybeRelocatable {
    fn from(value: Relocatable) -> Self {
        Self::Relocatable(value)
    }
}

impl PartialEq<Felt> for MaybeRelocatable {
    fn eq(&self, other: &Felt) -> bool {
        matches!(self, Self::Felt(f) if f == other)
    }
}

impl PartialEq<Relocatable> for MaybeRelocatable {
    fn eq(&self, other: &Relocatable) -> bool {
        matches!(self, Self::Relocatable(r) if r == other)
    }
}
