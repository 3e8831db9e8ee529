//! The Poseidon builtin: runs the Hades permutation over a 3-felt state and deduces the
//! resulting 3 output felts.

use starknet_types_core::felt::Felt;
use starknet_types_core::hash::Poseidon;

use crate::error::MemoryError;
use crate::memory::Memory;
use crate::relocatable::Relocatable;
use crate::value::MaybeRelocatable;

#[derive(Debug, Clone)]
pub struct PoseidonBuiltinRunner {
    pub base: Relocatable,
    pub ratio: Option<u32>,
    pub(super) stop_ptr: Option<usize>,
}

impl PoseidonBuiltinRunner {
    pub fn new(base: Relocatable, ratio: Option<u32>) -> Self {
        Self {
            base,
            ratio,
            stop_ptr: None,
        }
    }

    pub const fn cells_per_instance(&self) -> usize {
        6
    }

    pub const fn n_input_cells(&self) -> usize {
        3
    }

    pub fn deduce_memory_cell(
        &self,
        address: Relocatable,
        memory: &Memory,
    ) -> Result<Option<MaybeRelocatable>, MemoryError> {
        if address.segment_index != self.base.segment_index {
            return Ok(None);
        }
        let instance_offset = address.offset % self.cells_per_instance();
        if instance_offset < 3 {
            return Ok(None);
        }
        let instance_base = address
            .sub_uint(instance_offset)
            .expect("offset >= instance_offset by construction");

        let mut state = [Felt::ZERO; 3];
        for (i, slot) in state.iter_mut().enumerate() {
            let addr = instance_base.add_uint(i).expect("in range");
            match memory.get_felt(&addr) {
                Ok(felt) => *slot = felt,
                Err(_) => return Ok(None),
            }
        }
        Poseidon::hades_permutation(&mut state);

        Ok(Some(MaybeRelocatable::from_felt(state[instance_offset - 3])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduces_the_permuted_state() {
        let mut memory = Memory::new();
        let runner = PoseidonBuiltinRunner::new(Relocatable::new(9, 0), Some(32));
        memory
            .set(Relocatable::new(9, 0), MaybeRelocatable::from_felt(Felt::from(1u8)))
            .unwrap();
        memory
            .set(Relocatable::new(9, 1), MaybeRelocatable::from_felt(Felt::from(2u8)))
            .unwrap();
        memory
            .set(Relocatable::new(9, 2), MaybeRelocatable::from_felt(Felt::from(3u8)))
            .unwrap();

        let mut expected = [Felt::from(1u8), Felt::from(2u8), Felt::from(3u8)];
        Poseidon::hades_permutation(&mut expected);

        let out0 = runner.deduce_memory_cell(Relocatable::new(9, 3), &memory).unwrap().unwrap();
        assert_eq!(out0, MaybeRelocatable::from_felt(expected[0]));
    }
}
