//! Defines [`Memory`], the segmented, write-once store that backs a Cairo run.
//!
//! # Write-once semantics
//!
//! Memory here is mathematically immutable: writing a value to an address *asserts* it.
//! Writing the same value twice is a no-op; writing a different value is `InconsistentMemory`.
//!
//! # Segments
//!
//! Storage is split into positive segments (`segment_index >= 0`) and temporary segments
//! (`segment_index < 0`, stored at `-segment_index - 1`). Temporary segments exist only until
//! [`Memory::relocate_memory`] folds them into a positive segment at run end.

mod segment;

pub use self::segment::Segment;

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::MemoryError;
use crate::relocatable::Relocatable;
use crate::value::MaybeRelocatable;
use starknet_types_core::felt::Felt;

/// A per-segment structural check invoked on every first write to a cell in that segment
///. Returns the set of addresses it has certified, or an
/// error describing why the cell is invalid.
pub type ValidationRule =
    Rc<dyn Fn(&Memory, &Relocatable) -> Result<Vec<Relocatable>, MemoryError>>;

/// The segmented, write-once memory of the virtual machine.
#[derive(Default, Clone)]
pub struct Memory {
    segments: Vec<Segment>,
    temp_segments: Vec<Segment>,
    validation_rules: HashMap<usize, Vec<ValidationRule>>,
    relocation_rules: HashMap<isize, Relocatable>,
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("segments", &self.segments.len())
            .field("temp_segments", &self.temp_segments.len())
            .finish_non_exhaustive()
    }
}

fn temp_index(segment_index: isize) -> usize {
    (-segment_index - 1) as usize
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    fn segment(&self, segment_index: isize) -> Option<&Segment> {
        if segment_index >= 0 {
            self.segments.get(segment_index as usize)
        } else {
            self.temp_segments.get(temp_index(segment_index))
        }
    }

    fn segment_mut(&mut self, segment_index: isize) -> &mut Segment {
        if segment_index >= 0 {
            let idx = segment_index as usize;
            if self.segments.len() <= idx {
                self.segments.resize(idx + 1, Segment::new());
            }
            &mut self.segments[idx]
        } else {
            let idx = temp_index(segment_index);
            if self.temp_segments.len() <= idx {
                self.temp_segments.resize(idx + 1, Segment::new());
            }
            &mut self.temp_segments[idx]
        }
    }

    /// Reads the cell at `address`, if present. Does not trigger auto-deduction: that is the
    /// job of the builtin registry that wraps this memory.
    pub fn get(&self, address: &Relocatable) -> Option<&MaybeRelocatable> {
        self.segment(address.segment_index)
            .and_then(|seg| seg.get(address.offset))
    }

    pub fn get_felt(&self, address: &Relocatable) -> Result<Felt, MemoryError> {
        match self.get(address) {
            Some(MaybeRelocatable::Felt(f)) => Ok(*f),
            Some(MaybeRelocatable::Relocatable(_)) => Err(MemoryError::ExpectedInteger(*address)),
            None => Err(MemoryError::UnknownMemoryCell(*address)),
        }
    }

    pub fn get_relocatable(&self, address: &Relocatable) -> Result<Relocatable, MemoryError> {
        match self.get(address) {
            Some(MaybeRelocatable::Relocatable(r)) => Ok(*r),
            Some(MaybeRelocatable::Felt(_)) => Err(MemoryError::ExpectedRelocatable(*address)),
            None => Err(MemoryError::UnknownMemoryCell(*address)),
        }
    }

    pub fn get_felt_range(&self, base: &Relocatable, count: usize) -> Result<Vec<Felt>, MemoryError> {
        (0..count)
            .map(|i| self.get_felt(&base.add_uint(i).map_err(|_| MemoryError::OffsetExceeded)?))
            .collect()
    }

    pub fn get_cell_range(
        &self,
        base: &Relocatable,
        count: usize,
    ) -> Result<Vec<MaybeRelocatable>, MemoryError> {
        (0..count)
            .map(|i| {
                let addr = base.add_uint(i).map_err(|_| MemoryError::OffsetExceeded)?;
                self.get(&addr)
                    .copied()
                    .ok_or(MemoryError::UnknownMemoryCell(addr))
            })
            .collect()
    }

    /// Asserts `value` at `address`: write-once, triggering any validation rules registered
    /// for the segment on the cell's first write.
    pub fn set(&mut self, address: Relocatable, value: MaybeRelocatable) -> Result<(), MemoryError> {
        let was_known = self.get(&address).is_some();

        self.segment_mut(address.segment_index)
            .write(address.offset, value)
            .map_err(|existing| MemoryError::InconsistentMemory {
                address,
                existing,
                new: value,
            })?;

        if !was_known && address.segment_index >= 0 {
            let rules = self
                .validation_rules
                .get(&(address.segment_index as usize))
                .cloned()
                .unwrap_or_default();
            for rule in rules {
                let validated = rule(self, &address)?;
                for addr in validated {
                    if addr.segment_index >= 0 {
                        self.segment_mut(addr.segment_index)
                            .mark_validated(addr.offset);
                    }
                }
                self.segment_mut(address.segment_index)
                    .mark_validated(address.offset);
            }
        }

        Ok(())
    }

    /// Writes consecutive cells starting at `base`; returns the address just past the last
    /// one written.
    pub fn load_data(
        &mut self,
        base: Relocatable,
        data: &[MaybeRelocatable],
    ) -> Result<Relocatable, MemoryError> {
        for (i, value) in data.iter().enumerate() {
            let addr = base.add_uint(i).map_err(|_| MemoryError::OffsetExceeded)?;
            self.set(addr, *value)?;
        }
        base.add_uint(data.len()).map_err(|_| MemoryError::OffsetExceeded)
    }

    pub fn add_validation_rule(&mut self, segment_index: usize, rule: ValidationRule) {
        self.validation_rules
            .entry(segment_index)
            .or_default()
            .push(rule);
    }

    pub fn is_validated(&self, address: &Relocatable) -> bool {
        self.segment(address.segment_index)
            .map(|seg| seg.is_validated(address.offset))
            .unwrap_or(false)
    }

    pub fn used_size(&self, segment_index: isize) -> Option<usize> {
        self.segment(segment_index).map(|seg| seg.used_size())
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Installs a relocation-table entry mapping the temporary segment `src_segment` to
    /// `dst`. May be called at most once per source segment.
    pub fn relocate_segment(
        &mut self,
        src_segment: isize,
        dst: Relocatable,
    ) -> Result<(), MemoryError> {
        if self.relocation_rules.contains_key(&src_segment) {
            return Err(MemoryError::SegmentAlreadyRelocated);
        }
        self.relocation_rules.insert(src_segment, dst);
        Ok(())
    }

    /// Resolves the final, positive-segment base that `temp_segment` relocates to, chasing
    /// through any chained relocation targets to a fixed point.
    fn resolve_relocation_target(
        &self,
        temp_segment: isize,
        resolved: &mut HashMap<isize, Relocatable>,
        visiting: &mut Vec<isize>,
    ) -> Result<Relocatable, MemoryError> {
        if let Some(target) = resolved.get(&temp_segment) {
            return Ok(*target);
        }
        if visiting.contains(&temp_segment) {
            return Err(MemoryError::ChainedRelocation);
        }
        let raw_target = self
            .relocation_rules
            .get(&temp_segment)
            .copied()
            .ok_or(MemoryError::ChainedRelocation)?;

        let resolved_target = if raw_target.segment_index < 0 {
            visiting.push(temp_segment);
            let base = self.resolve_relocation_target(raw_target.segment_index, resolved, visiting)?;
            visiting.pop();
            base.add_uint(raw_target.offset)
                .map_err(|_| MemoryError::OffsetExceeded)?
        } else {
            raw_target
        };

        resolved.insert(temp_segment, resolved_target);
        Ok(resolved_target)
    }

    /// Flattens every temporary segment into its relocation target, then rewrites every
    /// relocatable cell value that referenced a temporary segment. Post-condition: no
    /// temporary segments remain.
    pub fn relocate_memory(&mut self) -> Result<(), MemoryError> {
        let mut resolved = HashMap::new();
        let keys: Vec<isize> = self.relocation_rules.keys().copied().collect();
        for k in keys {
            self.resolve_relocation_target(k, &mut resolved, &mut Vec::new())?;
        }

        let rewrite = |value: &mut MaybeRelocatable| {
            if let MaybeRelocatable::Relocatable(r) = value {
                if let Some(target) = resolved.get(&r.segment_index) {
                    *r = target.add_uint(r.offset).expect("relocation target in range");
                }
            }
        };
        for seg in self.segments.iter_mut() {
            for (_, cell) in seg.iter_mut() {
                rewrite(cell);
            }
        }
        for seg in self.temp_segments.iter_mut() {
            for (_, cell) in seg.iter_mut() {
                rewrite(cell);
            }
        }

        let appends: Vec<(Relocatable, MaybeRelocatable)> = resolved
            .iter()
            .flat_map(|(&temp_segment, &target)| {
                let idx = temp_index(temp_segment);
                self.temp_segments
                    .get(idx)
                    .into_iter()
                    .flat_map(|seg| seg.iter().collect::<Vec<_>>())
                    .map(move |(offset, value)| {
                        (
                            target.add_uint(offset).expect("relocation target in range"),
                            *value,
                        )
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        for (addr, value) in appends {
            self.set(addr, value)?;
        }

        self.temp_segments.clear();
        self.relocation_rules.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_after_set_round_trips() {
        let mut mem = Memory::new();
        let addr = Relocatable::new(0, 3);
        mem.set(addr, MaybeRelocatable::from_felt(Felt::from(9u8)))
            .unwrap();
        assert_eq!(mem.get_felt(&addr).unwrap(), Felt::from(9u8));
    }

    #[test]
    fn write_once_rejects_conflicting_values() {
        let mut mem = Memory::new();
        let addr = Relocatable::new(0, 0);
        mem.set(addr, MaybeRelocatable::from_felt(Felt::from(1u8)))
            .unwrap();
        let err = mem
            .set(addr, MaybeRelocatable::from_felt(Felt::from(2u8)))
            .unwrap_err();
        assert!(matches!(err, MemoryError::InconsistentMemory { .. }));
    }

    #[test]
    fn memory_hole_is_reported_as_unknown_cell() {
        let mut mem = Memory::new();
        mem.set(Relocatable::new(1, 0), MaybeRelocatable::from_felt(Felt::from(1u8)))
            .unwrap();
        mem.set(Relocatable::new(1, 2), MaybeRelocatable::from_felt(Felt::from(3u8)))
            .unwrap();
        assert_eq!(mem.used_size(1), Some(3));
        assert_eq!(
            mem.get_felt(&Relocatable::new(1, 1)),
            Err(MemoryError::UnknownMemoryCell(Relocatable::new(1, 1)))
        );
    }

    #[test]
    fn relocate_temp_segment_moves_its_data_and_rewrites_references() {
        let mut mem = Memory::new();
        let temp = Relocatable::new(-1, 0);
        mem.set(temp, MaybeRelocatable::from_felt(Felt::from(10u8)))
            .unwrap();
        mem.set(
            temp.add_uint(1).unwrap(),
            MaybeRelocatable::from_felt(Felt::from(20u8)),
        )
        .unwrap();
        mem.set(
            temp.add_uint(2).unwrap(),
            MaybeRelocatable::from_felt(Felt::from(30u8)),
        )
        .unwrap();
        // A pointer elsewhere in memory that refers into the temp segment.
        mem.set(Relocatable::new(0, 0), MaybeRelocatable::from_relocatable(temp))
            .unwrap();

        mem.relocate_segment(-1, Relocatable::new(1, 5)).unwrap();
        mem.relocate_memory().unwrap();

        assert_eq!(mem.get_felt(&Relocatable::new(1, 5)).unwrap(), Felt::from(10u8));
        assert_eq!(mem.get_felt(&Relocatable::new(1, 6)).unwrap(), Felt::from(20u8));
        assert_eq!(mem.get_felt(&Relocatable::new(1, 7)).unwrap(), Felt::from(30u8));
        assert_eq!(
            mem.get_relocatable(&Relocatable::new(0, 0)).unwrap(),
            Relocatable::new(1, 5)
        );
        assert_eq!(mem.temp_segments.len(), 0);
    }

    #[test]
    fn relocate_memory_is_identity_with_no_temp_segments() {
        let mut mem = Memory::new();
        mem.set(Relocatable::new(0, 0), MaybeRelocatable::from_felt(Felt::from(1u8)))
            .unwrap();
        mem.relocate_memory().unwrap();
        assert_eq!(mem.get_felt(&Relocatable::new(0, 0)).unwrap(), Felt::from(1u8));
    }

    #[test]
    fn relocating_the_same_segment_twice_is_an_error() {
        let mut mem = Memory::new();
        mem.relocate_segment(-1, Relocatable::new(1, 0)).unwrap();
        assert_eq!(
            mem.relocate_segment(-1, Relocatable::new(1, 1)),
            Err(MemoryError::SegmentAlreadyRelocated)
        );
    }
}
