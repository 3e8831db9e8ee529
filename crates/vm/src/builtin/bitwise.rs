//! The bitwise builtin: given `x` and `y`, deduces `x & y`, `x | y`, `x ^ y`.

use crate::error::MemoryError;
use crate::felt_ext::FeltExt;
use crate::memory::Memory;
use crate::relocatable::Relocatable;
use crate::value::MaybeRelocatable;

#[derive(Debug, Clone)]
pub struct BitwiseBuiltinRunner {
    pub base: Relocatable,
    pub ratio: Option<u32>,
    pub(super) stop_ptr: Option<usize>,
}

impl BitwiseBuiltinRunner {
    pub fn new(base: Relocatable, ratio: Option<u32>) -> Self {
        Self {
            base,
            ratio,
            stop_ptr: None,
        }
    }

    pub const fn cells_per_instance(&self) -> usize {
        5
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
        if instance_offset < 2 {
            return Ok(None);
        }
        let instance_base = address
            .sub_uint(instance_offset)
            .expect("offset >= instance_offset by construction");
        let x = match memory.get_felt(&instance_base) {
            Ok(x) => x,
            Err(_) => return Ok(None),
        };
        let y = match memory.get_felt(&instance_base.add_uint(1).expect("in range")) {
            Ok(y) => y,
            Err(_) => return Ok(None),
        };
        let result = match instance_offset {
            2 => x.bitand(&y),
            3 => x.bitor(&y),
            4 => x.bitxor(&y),
            _ => unreachable!(),
        };
        Ok(Some(MaybeRelocatable::from_felt(result)))
    }
}
