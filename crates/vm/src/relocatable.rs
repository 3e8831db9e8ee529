//! Defines [`Relocatable`], a `(segment_index, offset)` address into the segmented memory.
//!
//! A negative `segment_index` denotes a temporary segment. Temporary segments exist only
//! until `Memory::relocate_memory` rewrites every reference to them; a well-formed final trace
//! never contains one.

use std::cmp::Ordering;

use num_traits::ToPrimitive;
use starknet_types_core::felt::Felt;

use crate::error::MathError;

/// An address into the segmented memory: a segment index and an offset within it.
///
/// Negative segment indices are temporary segments; they are only ever
/// produced by `addTempSegment` and must be relocated away before a run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Relocatable {
    pub segment_index: isize,
    pub offset: usize,
}

impl Relocatable {
    pub const fn new(segment_index: isize, offset: usize) -> Self {
        Self {
            segment_index,
            offset,
        }
    }

    pub const fn is_temporary(&self) -> bool {
        self.segment_index < 0
    }

    /// `self + offset`, as an unsigned displacement.
    pub fn add_uint(&self, offset: usize) -> Result<Self, MathError> {
        Ok(Self {
            segment_index: self.segment_index,
            offset: self
                .offset
                .checked_add(offset)
                .ok_or(MathError::OffsetExceeded)?,
        })
    }

    /// `self + offset`, sign-extended: a negative `offset` subtracts from the address.
    pub fn add_int(&self, offset: isize) -> Result<Self, MathError> {
        if offset >= 0 {
            self.add_uint(offset as usize)
        } else {
            self.sub_uint(offset.unsigned_abs())
        }
    }

    /// `self - offset`. Fails if the result would underflow the offset.
    pub fn sub_uint(&self, offset: usize) -> Result<Self, MathError> {
        self.offset
            .checked_sub(offset)
            .map(|offset| Self {
                segment_index: self.segment_index,
                offset,
            })
            .ok_or(MathError::RelocatableSubUsizeNegOffset)
    }

    /// `self + felt`, where `felt` must fit in a `usize` to become an offset delta.
    pub fn add_felt(&self, felt: &Felt) -> Result<Self, MathError> {
        let delta = felt.to_usize().ok_or(MathError::OffsetExceeded)?;
        self.add_uint(delta)
    }

    /// The signed distance between two addresses in the same segment.
    pub fn sub(&self, other: &Self) -> Result<isize, MathError> {
        if self.segment_index != other.segment_index {
            return Err(MathError::TypeMismatch);
        }
        Ok(self.offset as isize - other.offset as isize)
    }
}

impl PartialOrd for Relocatable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Relocatable {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.segment_index, self.offset).cmp(&(other.segment_index, other.offset))
    }
}

impl From<(isize, usize)> for Relocatable {
    fn from((segment_index, offset): (isize, usize)) -> Self {
        Self::new(segment_index, offset)
    }
}

impl std::fmt::Display for Relocatable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.segment_index, self.offset)
    }
}
