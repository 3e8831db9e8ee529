//! The Pedersen hash builtin: deduces `hash(x, y)` in the third cell of each instance.

use starknet_types_core::hash::{Pedersen, StarkHash};

use crate::error::MemoryError;
use crate::memory::Memory;
use crate::relocatable::Relocatable;
use crate::value::MaybeRelocatable;

#[derive(Debug, Clone)]
pub struct PedersenBuiltinRunner {
    pub base: Relocatable,
    pub ratio: Option<u32>,
    pub(super) stop_ptr: Option<usize>,
}

impl PedersenBuiltinRunner {
    pub fn new(base: Relocatable, ratio: Option<u32>) -> Self {
        Self {
            base,
            ratio,
            stop_ptr: None,
        }
    }

    pub const fn cells_per_instance(&self) -> usize {
        3
    }

    pub const fn n_input_cells(&self) -> usize {
        2
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
        if instance_offset != 2 {
            return Ok(None);
        }
        let instance_base = address.sub_uint(2).expect("offset % 3 == 2 implies offset >= 2");
        let x = match memory.get_felt(&instance_base) {
            Ok(x) => x,
            Err(_) => return Ok(None),
        };
        let y = match memory.get_felt(&instance_base.add_uint(1).expect("in range")) {
            Ok(y) => y,
            Err(_) => return Ok(None),
        };
        Ok(Some(MaybeRelocatable::from_felt(Pedersen::hash(&x, &y))))
    }
}
