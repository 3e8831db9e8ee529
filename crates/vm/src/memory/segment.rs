//! Defines [`Segment`], the flat, growable cell array backing one region of [`Memory`].
//!
//! Cells are a plain `Vec<Option<MaybeRelocatable>>`: the validation-rule bitmap and the
//! used-size bookkeeping this crate adds on top need per-cell state a tightly packed
//! representation has no room for, so the tradeoff is spelled out in `DESIGN.md` rather than
//! hidden behind `unsafe`.

use crate::value::MaybeRelocatable;

/// A contiguous, append-only region of memory. See [module docs](self).
#[derive(Debug, Default, Clone)]
pub struct Segment {
    cells: Vec<Option<MaybeRelocatable>>,
    /// Addresses a validation rule has already certified; recorded so the rule is not
    /// re-invoked for the same offset on a later read.
    validated: Vec<bool>,
}

impl Segment {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of cells ever addressed in this segment: the largest `offset + 1` written
    /// so far.
    pub fn used_size(&self) -> usize {
        self.cells.len()
    }

    pub fn get(&self, offset: usize) -> Option<&MaybeRelocatable> {
        self.cells.get(offset).and_then(|c| c.as_ref())
    }

    fn ensure_capacity(&mut self, offset: usize) {
        if self.cells.len() <= offset {
            self.cells.resize(offset + 1, None);
            self.validated.resize(offset + 1, false);
        }
    }

    /// Writes `value` to `offset`. Write-once: if a value is already present, succeeds only
    /// if it is equal to `value`; returns the previous value on a mismatch so the caller can
    /// build an `InconsistentMemory` error.
    pub fn write(
        &mut self,
        offset: usize,
        value: MaybeRelocatable,
    ) -> Result<(), MaybeRelocatable> {
        self.ensure_capacity(offset);
        match self.cells[offset] {
            Some(existing) if existing != value => Err(existing),
            Some(_) => Ok(()),
            None => {
                self.cells[offset] = Some(value);
                Ok(())
            }
        }
    }

    pub fn is_validated(&self, offset: usize) -> bool {
        self.validated.get(offset).copied().unwrap_or(false)
    }

    pub fn mark_validated(&mut self, offset: usize) {
        self.ensure_capacity(offset);
        self.validated[offset] = true;
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &MaybeRelocatable)> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|v| (i, v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut MaybeRelocatable)> {
        self.cells
            .iter_mut()
            .enumerate()
            .filter_map(|(i, c)| c.as_mut().map(|v| (i, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starknet_types_core::felt::Felt;

    #[test]
    fn write_once_allows_repeating_the_same_value() {
        let mut seg = Segment::new();
        let v = MaybeRelocatable::from_felt(Felt::from(7u8));
        assert!(seg.write(0, v).is_ok());
        assert!(seg.write(0, v).is_ok());
    }

    #[test]
    fn write_once_rejects_a_different_value() {
        let mut seg = Segment::new();
        seg.write(0, MaybeRelocatable::from_felt(Felt::from(7u8)))
            .unwrap();
        let err = seg
            .write(0, MaybeRelocatable::from_felt(Felt::from(8u8)))
            .unwrap_err();
        assert_eq!(err, MaybeRelocatable::from_felt(Felt::from(7u8)));
    }

    #[test]
    fn used_size_tracks_the_highest_offset_written() {
        let mut seg = Segment::new();
        seg.write(0, MaybeRelocatable::from_felt(Felt::from(1u8)))
            .unwrap();
        seg.write(2, MaybeRelocatable::from_felt(Felt::from(3u8)))
            .unwrap();
        assert_eq!(seg.used_size(), 3);
        assert!(seg.get(1).is_none());
    }
}
