//! The Keccak builtin: permutes an 8-felt input block (packed as 25 64-bit lanes) through
//! `keccak-f[1600]` and deduces the resulting 8 output felts.
//!
//! Each of the 8 input felts holds 200 bits (`1600 / 8`), split little-endian into consecutive
//! 64-bit lanes of the permutation state, matching the packing used by the reference compiler's
//! `keccak_builtin` layout.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::MemoryError;
use crate::memory::Memory;
use crate::relocatable::Relocatable;
use crate::value::MaybeRelocatable;
use starknet_types_core::felt::Felt;

#[derive(Debug, Clone)]
pub struct KeccakBuiltinRunner {
    pub base: Relocatable,
    pub ratio: Option<u32>,
    pub(super) stop_ptr: Option<usize>,
}

impl KeccakBuiltinRunner {
    pub fn new(base: Relocatable, ratio: Option<u32>) -> Self {
        Self {
            base,
            ratio,
            stop_ptr: None,
        }
    }

    pub const fn cells_per_instance(&self) -> usize {
        16
    }

    pub const fn n_input_cells(&self) -> usize {
        8
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
        if instance_offset < self.n_input_cells() {
            return Ok(None);
        }
        let instance_base = address
            .sub_uint(instance_offset)
            .expect("offset >= instance_offset by construction");

        let mut inputs = [Felt::ZERO; 8];
        for (i, slot) in inputs.iter_mut().enumerate() {
            let addr = instance_base.add_uint(i).expect("in range");
            match memory.get_felt(&addr) {
                Ok(felt) => *slot = felt,
                Err(_) => return Ok(None),
            }
        }

        let mut state = pack_state(&inputs);
        keccak::f1600(&mut state);
        let outputs = unpack_state(&state);

        Ok(Some(MaybeRelocatable::from_felt(
            outputs[instance_offset - self.n_input_cells()],
        )))
    }
}

fn pack_state(inputs: &[Felt; 8]) -> [u64; 25] {
    let mut state = [0u64; 25];
    for (word_idx, felt) in inputs.iter().enumerate() {
        let bytes = felt.to_biguint().to_bytes_le();
        for lane in 0..3 {
            let lane_idx = word_idx * 3 + lane;
            if lane_idx >= 25 {
                break;
            }
            let start = lane * 8;
            let mut buf = [0u8; 8];
            for (i, b) in buf.iter_mut().enumerate() {
                *b = bytes.get(start + i).copied().unwrap_or(0);
            }
            state[lane_idx] = u64::from_le_bytes(buf);
        }
    }
    state
}

fn unpack_state(state: &[u64; 25]) -> [Felt; 8] {
    let mut outputs = [Felt::ZERO; 8];
    for (word_idx, output) in outputs.iter_mut().enumerate() {
        let mut value = BigUint::zero();
        for lane in (0..3).rev() {
            let lane_idx = word_idx * 3 + lane;
            if lane_idx >= 25 {
                continue;
            }
            value <<= 64;
            value += BigUint::from(state[lane_idx]);
        }
        *output = Felt::from(value);
    }
    outputs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduces_output_cells_from_input_cells() {
        let mut memory = Memory::new();
        let runner = KeccakBuiltinRunner::new(Relocatable::new(8, 0), Some(2048));
        for i in 0..8 {
            memory
                .set(
                    Relocatable::new(8, i),
                    MaybeRelocatable::from_felt(Felt::from(i as u64)),
                )
                .unwrap();
        }
        let first_output = runner
            .deduce_memory_cell(Relocatable::new(8, 8), &memory)
            .unwrap()
            .unwrap();
        assert!(matches!(first_output, MaybeRelocatable::Felt(_)));
        // Deterministic: running the permutation twice on the same input agrees.
        let again = runner
            .deduce_memory_cell(Relocatable::new(8, 8), &memory)
            .unwrap()
            .unwrap();
        assert_eq!(first_output, again);
    }
}
