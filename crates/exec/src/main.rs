//! Command-line entry point for running compiled Cairo programs on the VM core.
//!
//! Loads a compiled program, picks a builtin layout, drives the [`CairoRunner`] to completion,
//! and optionally writes the relocated trace and memory to disk in the reference compiler's
//! on-disk binary formats. Exit codes: `0` on success, non-zero on any categorized VM error.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use cairo_vm_core::error::{MemoryError, RunnerError, VirtualMachineError};
use cairo_vm_core::hint::NoopHintProcessor;
use cairo_vm_core::layout;
use cairo_vm_core::runner::CairoRunner;
use cairo_vm_core::trace::{relocate_memory, relocate_trace, segment_bases, VecTrace};
use clap::Parser;
use thiserror::Error;
use tracing::{debug, info};

/// Runs a compiled Cairo program against the register-based execution core.
#[derive(Debug, Parser)]
#[command(name = "cairo-vm", version, about)]
struct Cli {
    /// Path to a compiled program (the reference compiler's `--output json` format).
    program: PathBuf,

    /// Which builtin layout to run under.
    #[arg(long, default_value = "plain")]
    layout: String,

    /// Entrypoint identifier to start execution from.
    #[arg(long, default_value = "main")]
    entrypoint: String,

    /// Require the end state to align to a power-of-two step count, as a prover would.
    #[arg(long, default_value_t = false)]
    proof_mode: bool,

    /// Write the relocated execution trace to this path.
    #[arg(long)]
    trace_file: Option<PathBuf>,

    /// Write the relocated memory to this path.
    #[arg(long)]
    memory_file: Option<PathBuf>,
}

/// Errors the CLI itself can raise, beyond whatever the core or loader already report.
#[derive(Debug, Error)]
enum CliError {
    #[error("could not read program file {path:?}: {source}")]
    ReadProgram { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Loader(#[from] cairo_vm_loader::LoaderError),
    #[error("unknown layout {0:?}")]
    UnknownLayout(String),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error(transparent)]
    Vm(#[from] VirtualMachineError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error("proof mode requires the trace length to be a power of two, got {0}")]
    NotPowerOfTwo(usize),
    #[error("could not write {path:?}: {source}")]
    WriteOutput { path: PathBuf, source: io::Error },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let source = fs::read_to_string(&cli.program).map_err(|source| CliError::ReadProgram {
        path: cli.program.clone(),
        source,
    })?;
    let program = cairo_vm_loader::load_program(&source)?;
    info!(
        program = %cli.program.display(),
        builtins = ?program.builtins,
        "loaded program"
    );

    let layout_def = layout::lookup(&cli.layout).ok_or_else(|| CliError::UnknownLayout(cli.layout.clone()))?;
    debug!(layout = layout_def.name, "selected layout");

    let mut runner = CairoRunner::new(&program, layout_def, &cli.entrypoint)?;
    let mut hint_processor = NoopHintProcessor;
    let mut trace = VecTrace::new();
    runner.run(&mut hint_processor, &program.hints, &mut trace)?;
    runner.end_run()?;
    runner.relocate()?;

    let step_count = trace.entries().len();
    info!(steps = step_count, "run halted at end-of-program sentinel");

    if cli.proof_mode && !step_count.is_power_of_two() {
        return Err(CliError::NotPowerOfTwo(step_count));
    }

    let bases = segment_bases(runner.vm().segments())?;

    if let Some(path) = &cli.trace_file {
        let relocated = relocate_trace(trace.entries(), &bases)?;
        write_trace_file(path, &relocated)?;
        info!(path = %path.display(), entries = relocated.len(), "wrote trace file");
    }

    if let Some(path) = &cli.memory_file {
        let flat = relocate_memory(runner.vm().memory(), runner.vm().segments())?;
        write_memory_file(path, &flat)?;
        info!(path = %path.display(), cells = flat.len(), "wrote memory file");
    }

    Ok(())
}

/// Writes the relocated trace as the reference compiler's trace-file binary format: one row
/// per step, each register serialized as an 8-byte little-endian integer, in `(ap, fp, pc)`
/// order.
fn write_trace_file(
    path: &PathBuf,
    entries: &[cairo_vm_core::trace::RelocatedTraceEntry],
) -> Result<(), CliError> {
    let mut buf = Vec::with_capacity(entries.len() * 24);
    for entry in entries {
        buf.extend_from_slice(&(entry.ap as u64).to_le_bytes());
        buf.extend_from_slice(&(entry.fp as u64).to_le_bytes());
        buf.extend_from_slice(&(entry.pc as u64).to_le_bytes());
    }
    write_file(path, &buf)
}

/// Writes the relocated memory as the reference compiler's memory-file binary format: one
/// entry per populated cell, an 8-byte little-endian address followed by the felt's 32-byte
/// little-endian canonical representative.
fn write_memory_file(path: &PathBuf, cells: &[(usize, starknet_types_core::felt::Felt)]) -> Result<(), CliError> {
    let mut buf = Vec::with_capacity(cells.len() * 40);
    for (address, value) in cells {
        buf.extend_from_slice(&(*address as u64).to_le_bytes());
        buf.extend_from_slice(&value.to_bytes_le());
    }
    write_file(path, &buf)
}

fn write_file(path: &PathBuf, buf: &[u8]) -> Result<(), CliError> {
    let mut file = fs::File::create(path).map_err(|source| CliError::WriteOutput {
        path: path.clone(),
        source,
    })?;
    file.write_all(buf).map_err(|source| CliError::WriteOutput {
        path: path.clone(),
        source,
    })
}
