//! Defines the [`HintProcessor`] trait boundary.
//!
//! Hints are opaque to the core: the virtual machine knows only that a program counter may
//! carry zero or more hint strings to run before the instruction at that address executes.
//! Actually interpreting hint source text (Python-like snippets in the reference compiler, or
//! pre-resolved hint codes in the Starknet OS) is a concern for a layer above this crate; the
//! core only defines the contract and ships a no-op implementation for programs with no hints.

use crate::cpu::Cpu;
use crate::error::HintError;
use crate::memory::Memory;
use crate::scopes::ExecutionScopes;

/// One hint attached to a program counter, as read from the compiled program.
#[derive(Debug, Clone)]
pub struct HintData {
    /// The hint's source code, in whatever language the compiler that produced it used.
    pub code: String,
    /// Names of references the hint may read, resolved to their defining expression.
    pub reference_ids: Vec<usize>,
}

/// The boundary between the virtual machine's step function and whatever executes hints.
///
/// Implementors are given full read/write access to memory and registers, and to the
/// [`ExecutionScopes`] that persists hint-local state across steps.
pub trait HintProcessor {
    /// Executes every hint attached to the current program counter, before the instruction
    /// there is fetched.
    fn execute_hints(
        &mut self,
        hints: &[HintData],
        cpu: &mut Cpu,
        memory: &mut Memory,
        scopes: &mut ExecutionScopes,
    ) -> Result<(), HintError>;
}

/// A [`HintProcessor`] that rejects any program carrying hints.
///
/// Appropriate for programs known ahead of time to have none.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHintProcessor;

impl HintProcessor for NoopHintProcessor {
    fn execute_hints(
        &mut self,
        hints: &[HintData],
        _cpu: &mut Cpu,
        _memory: &mut Memory,
        _scopes: &mut ExecutionScopes,
    ) -> Result<(), HintError> {
        match hints.first() {
            Some(hint) => Err(HintError::HintNotImplemented(hint.code.clone())),
            None => Ok(()),
        }
    }
}
