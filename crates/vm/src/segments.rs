//! Defines [`SegmentManager`], responsible for allocating new segments
//! (permanent or temporary) and computing their effective sizes once a run has finished.

use crate::error::MemoryError;
use crate::memory::Memory;
use crate::relocatable::Relocatable;
use crate::value::MaybeRelocatable;

/// Allocates segments and tracks their sizes on top of a [`Memory`].
#[derive(Debug, Default)]
pub struct SegmentManager {
    next_segment: isize,
    next_temp_segment: isize,
    /// The size of each segment once the run has ended and no more cells will be written,
    /// `None` before [`SegmentManager::compute_effective_sizes`] has run.
    effective_sizes: Option<Vec<usize>>,
}

impl SegmentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new, empty positive segment and returns its base address.
    pub fn add_segment(&mut self) -> Relocatable {
        let index = self.next_segment;
        self.next_segment += 1;
        Relocatable::new(index, 0)
    }

    /// Allocates a new temporary segment and returns its base address (a negative segment
    /// index).
    pub fn add_temp_segment(&mut self) -> Relocatable {
        self.next_temp_segment -= 1;
        Relocatable::new(self.next_temp_segment, 0)
    }

    pub fn segment_count(&self) -> usize {
        self.next_segment as usize
    }

    /// Writes `data` into a freshly allocated segment and returns its base address — the
    /// common pattern used to materialize a `Vec<MaybeRelocatable>` hint argument into memory
    ///.
    pub fn gen_arg(
        &mut self,
        memory: &mut Memory,
        data: &[MaybeRelocatable],
    ) -> Result<Relocatable, MemoryError> {
        let base = self.add_segment();
        memory.load_data(base, data)?;
        Ok(base)
    }

    /// Freezes the used size of every positive segment. Must run once, after the last write
    /// to memory and before relocation.
    pub fn compute_effective_sizes(&mut self, memory: &Memory) {
        let sizes = (0..self.segment_count())
            .map(|i| memory.used_size(i as isize).unwrap_or(0))
            .collect();
        self.effective_sizes = Some(sizes);
    }

    pub fn get_segment_used_size(&self, segment_index: usize) -> Result<usize, MemoryError> {
        self.effective_sizes
            .as_ref()
            .ok_or(MemoryError::MissingSegmentUsedSizes)?
            .get(segment_index)
            .copied()
            .ok_or(MemoryError::MissingSegmentUsedSizes)
    }

    pub fn effective_sizes(&self) -> Option<&[usize]> {
        self.effective_sizes.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_are_allocated_in_order() {
        let mut segments = SegmentManager::new();
        assert_eq!(segments.add_segment(), Relocatable::new(0, 0));
        assert_eq!(segments.add_segment(), Relocatable::new(1, 0));
        assert_eq!(segments.add_temp_segment(), Relocatable::new(-1, 0));
        assert_eq!(segments.add_temp_segment(), Relocatable::new(-2, 0));
    }

    #[test]
    fn effective_sizes_require_compute_first() {
        let segments = SegmentManager::new();
        assert_eq!(
            segments.get_segment_used_size(0),
            Err(MemoryError::MissingSegmentUsedSizes)
        );
    }

    #[test]
    fn gen_arg_writes_data_into_a_fresh_segment() {
        let mut segments = SegmentManager::new();
        let mut memory = Memory::new();
        let data = vec![MaybeRelocatable::from_felt(starknet_types_core::felt::Felt::from(7u8))];
        let base = segments.gen_arg(&mut memory, &data).unwrap();
        assert_eq!(memory.get_felt(&base).unwrap(), starknet_types_core::felt::Felt::from(7u8));
    }
}
