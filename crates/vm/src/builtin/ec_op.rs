//! The elliptic-curve operation builtin: deduces `R = P + m * Q` on the Stark curve.

use starknet_types_core::curve::AffinePoint;

use crate::error::MemoryError;
use crate::memory::Memory;
use crate::relocatable::Relocatable;
use crate::value::MaybeRelocatable;

#[derive(Debug, Clone)]
pub struct EcOpBuiltinRunner {
    pub base: Relocatable,
    pub ratio: Option<u32>,
    pub(super) stop_ptr: Option<usize>,
}

impl EcOpBuiltinRunner {
    pub fn new(base: Relocatable, ratio: Option<u32>) -> Self {
        Self {
            base,
            ratio,
            stop_ptr: None,
        }
    }

    pub const fn cells_per_instance(&self) -> usize {
        7
    }

    pub const fn n_input_cells(&self) -> usize {
        5
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
        if instance_offset != 5 && instance_offset != 6 {
            return Ok(None);
        }
        let instance_base = address
            .sub_uint(instance_offset)
            .expect("offset >= instance_offset by construction");

        let mut cells = [None; 5];
        for (i, cell) in cells.iter_mut().enumerate() {
            let addr = instance_base.add_uint(i).expect("in range");
            *cell = memory.get_felt(&addr).ok();
        }
        let [Some(px), Some(py), Some(qx), Some(qy), Some(m)] = cells else {
            return Ok(None);
        };

        let p = AffinePoint::new(px, py).map_err(|_| MemoryError::ExpectedInteger(instance_base))?;
        let q = AffinePoint::new(qx, qy)
            .map_err(|_| MemoryError::ExpectedInteger(instance_base.add_uint(2).unwrap()))?;
        let r = p + &q * m;

        let value = if instance_offset == 5 { r.x() } else { r.y() };
        Ok(Some(MaybeRelocatable::from_felt(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starknet_types_core::felt::Felt;

    #[test]
    fn deduces_the_result_point() {
        let mut memory = Memory::new();
        let runner = EcOpBuiltinRunner::new(Relocatable::new(6, 0), Some(256));
        let generator = AffinePoint::generator();
        memory
            .set(Relocatable::new(6, 0), MaybeRelocatable::from_felt(generator.x()))
            .unwrap();
        memory
            .set(Relocatable::new(6, 1), MaybeRelocatable::from_felt(generator.y()))
            .unwrap();
        memory
            .set(Relocatable::new(6, 2), MaybeRelocatable::from_felt(generator.x()))
            .unwrap();
        memory
            .set(Relocatable::new(6, 3), MaybeRelocatable::from_felt(generator.y()))
            .unwrap();
        memory
            .set(Relocatable::new(6, 4), MaybeRelocatable::from_felt(Felt::from(2u8)))
            .unwrap();

        let expected = generator.clone() + &generator * Felt::from(2u8);
        let rx = runner.deduce_memory_cell(Relocatable::new(6, 5), &memory).unwrap().unwrap();
        assert_eq!(rx, MaybeRelocatable::from_felt(expected.x()));
    }
}
