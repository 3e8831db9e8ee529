//! The output builtin: a plain append-only segment the program writes its public output to.

use std::collections::HashMap;

use crate::error::RunnerError;
use crate::relocatable::Relocatable;

/// A page of output memory, as produced by `output_builtin.add_page` in the reference
/// compiler's std library (used by proof-mode programs that interleave multiple outputs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputPage {
    pub start: usize,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct OutputBuiltinRunner {
    pub base: Relocatable,
    pub(super) stop_ptr: Option<usize>,
    pages: HashMap<u64, OutputPage>,
}

impl OutputBuiltinRunner {
    pub fn new(base: Relocatable) -> Self {
        Self {
            base,
            stop_ptr: None,
            pages: HashMap::new(),
        }
    }

    pub const fn cells_per_instance(&self) -> usize {
        1
    }

    pub const fn n_input_cells(&self) -> usize {
        1
    }

    /// Records a named slice of the output segment for prover consumption. `start` must lie on
    /// this builtin's own segment, and `id` must not already be in use.
    pub fn add_page(&mut self, id: u64, start: Relocatable, size: usize) -> Result<(), RunnerError> {
        if start.segment_index != self.base.segment_index {
            return Err(RunnerError::OutputPageWrongSegment);
        }
        if self.pages.contains_key(&id) {
            return Err(RunnerError::DuplicateOutputPage(id));
        }
        self.pages.insert(
            id,
            OutputPage {
                start: start.offset,
                size,
            },
        );
        Ok(())
    }

    /// Replaces the page state wholesale, as `output_builtin.new_state` does around a nested
    /// call that needs its own page numbering.
    pub fn set_state(&mut self, base: Relocatable, pages: HashMap<u64, OutputPage>) {
        self.base = base;
        self.pages = pages;
    }

    pub fn pages(&self) -> &HashMap<u64, OutputPage> {
        &self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_page_records_a_named_slice_of_the_output_segment() {
        let mut output = OutputBuiltinRunner::new(Relocatable::new(2, 0));
        output.add_page(0, Relocatable::new(2, 3), 5).unwrap();
        assert_eq!(output.pages()[&0], OutputPage { start: 3, size: 5 });
    }

    #[test]
    fn add_page_rejects_a_start_outside_its_own_segment() {
        let mut output = OutputBuiltinRunner::new(Relocatable::new(2, 0));
        let err = output.add_page(0, Relocatable::new(3, 0), 1).unwrap_err();
        assert!(matches!(err, RunnerError::OutputPageWrongSegment));
    }

    #[test]
    fn add_page_rejects_a_reused_id() {
        let mut output = OutputBuiltinRunner::new(Relocatable::new(2, 0));
        output.add_page(0, Relocatable::new(2, 0), 1).unwrap();
        let err = output.add_page(0, Relocatable::new(2, 1), 1).unwrap_err();
        assert!(matches!(err, RunnerError::DuplicateOutputPage(0)));
    }

    #[test]
    fn set_state_replaces_base_and_pages_wholesale() {
        let mut output = OutputBuiltinRunner::new(Relocatable::new(2, 0));
        output.add_page(0, Relocatable::new(2, 0), 1).unwrap();

        let mut fresh = HashMap::new();
        fresh.insert(
            7,
            OutputPage {
                start: 0,
                size: 2,
            },
        );
        output.set_state(Relocatable::new(5, 0), fresh);

        assert_eq!(output.base, Relocatable::new(5, 0));
        assert_eq!(output.pages().len(), 1);
        assert!(output.pages().contains_key(&7));
    }
}
