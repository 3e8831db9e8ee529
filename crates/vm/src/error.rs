//! Typed errors for every subsystem of the core, composed into [`VirtualMachineError`].
//!
//! Each enum corresponds to one error category (memory, math, instruction, runner, hint).
//! Conversions compose them into the single top-level error
//! returned by the step function and the runner.

use thiserror::Error;

use crate::relocatable::Relocatable;
use crate::value::MaybeRelocatable;

/// Errors raised by the memory subsystem.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error("unknown memory cell at {0:?}")]
    UnknownMemoryCell(Relocatable),
    #[error("inconsistent memory write at {address:?}: existing {existing:?}, new {new:?}")]
    InconsistentMemory {
        address: Relocatable,
        existing: MaybeRelocatable,
        new: MaybeRelocatable,
    },
    #[error("expected integer at {0:?}")]
    ExpectedInteger(Relocatable),
    #[error("expected relocatable at {0:?}")]
    ExpectedRelocatable(Relocatable),
    #[error("cannot add two relocatable values")]
    RelocatableAdd,
    #[error("subtracting usize from relocatable would produce a negative offset")]
    RelocatableSubUsizeNegOffset,
    #[error("felt value exceeds usize range for an offset")]
    OffsetExceeded,
    #[error("effective segment sizes have not been computed")]
    MissingSegmentUsedSizes,
    #[error("range-check builtin could not read its operand")]
    RangeCheckGetError,
    #[error("range-check cell does not hold an integer")]
    RangecheckNonInt,
    #[error("felt does not fit in the range-check bound")]
    RangeCheckNumberOutOfBounds,
    #[error("no signature registered for public key at {0:?}")]
    SignatureNotFound(Relocatable),
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("public key cell does not hold an integer")]
    PubKeyNonInt,
    #[error("message cell does not hold an integer")]
    MsgNonInt,
    #[error("attempted to relocate a temporary segment that was already relocated")]
    SegmentAlreadyRelocated,
    #[error("relocation target for a temporary segment is itself unrelocated (chained relocation)")]
    ChainedRelocation,
}

/// Errors raised by field/relocatable arithmetic.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MathError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("safe_div: {0} does not evenly divide {1}")]
    SafeDivFail(String, String),
    #[error("felt does not fit in a u32")]
    Felt252ToU32Conversion,
    #[error("secp split value out of range")]
    SecpSplitOutOfRange,
    #[error("secp verification requires a non-zero value")]
    SecpVerifyZero,
    #[error("point is not on the curve")]
    PointNotOnCurve,
    #[error("cannot add two relocatable values")]
    RelocatableAdd,
    #[error("subtracting usize from relocatable would produce a negative offset")]
    RelocatableSubUsizeNegOffset,
    #[error("relocatables belong to different segments")]
    TypeMismatch,
    #[error("felt value exceeds usize range for an offset")]
    OffsetExceeded,
    #[error("value is not a felt")]
    TypeMismatchNotFelt,
    #[error("value is not a relocatable")]
    TypeMismatchNotRelocatable,
    #[error("arithmetic not implemented for this combination of cell kinds")]
    NotImplementedCellArith,
}

/// Errors raised while decoding or executing a single instruction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InstructionError {
    #[error("invalid instruction encoding")]
    InstructionEncoding,
    #[error("could not fetch instruction at the program counter")]
    InstructionFetch,
    #[error("op1 references op0 but op0 is not a relocatable value")]
    UnknownOp0,
    #[error("could not compute a value for op0")]
    FailedToComputeOp0,
    #[error("could not compute a value for op1")]
    FailedToComputeOp1,
    #[error("could not compute a value for dst")]
    NoDst,
    #[error("assert_eq failed: dst and res disagree")]
    DiffAssertValues,
    #[error(transparent)]
    Math(#[from] MathError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Errors raised by the builtin runner framework and the Cairo runner orchestration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunnerError {
    #[error("builtin {0} has no stop pointer")]
    NoStopPointer(String),
    #[error("stop pointer for builtin {0} references the wrong segment")]
    InvalidStopPointerIndex(String),
    #[error("stop pointer for builtin {0} has the wrong offset")]
    InvalidStopPointer(String),
    #[error("builtin {0} is required by the program but is not part of the selected layout")]
    BuiltinNotInLayout(String),
    #[error("program has no `main` entrypoint")]
    MissingMain,
    #[error("reached the end of the program without halting")]
    EndOfProgram,
    #[error("builtin {0} is referenced in a temporary segment and has no final base")]
    RunnerInTemporarySegment(String),
    #[error("output page start must lie on the output builtin's own segment")]
    OutputPageWrongSegment,
    #[error("output page id {0} is already in use")]
    DuplicateOutputPage(u64),
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Errors surfaced by the hint driver boundary, opaque to the core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HintError {
    #[error("missing constant {0}")]
    MissingConstant(String),
    #[error("identifier {0} has no member {1}")]
    IdentifierHasNoMember(String, String),
    #[error("identifier {0} is not relocatable")]
    IdentifierNotRelocatable(String),
    #[error("hint not implemented: {0}")]
    HintNotImplemented(String),
    #[error("n_pair_bits is too low for m")]
    NPairBitsTooLowM,
    #[error(transparent)]
    Math(#[from] MathError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// The top-level error type returned by the step function and the Cairo runner.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VirtualMachineError {
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Math(#[from] MathError),
    #[error(transparent)]
    Instruction(#[from] InstructionError),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error(transparent)]
    Hint(#[from] HintError),
}
