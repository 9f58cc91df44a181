//! make-id: compute a program's method id.
//!
//! Reads a RISC-V ELF and writes the raw method-id bytes (digest-count x
//! 32 bytes, little-endian words, no framing). Exit code 0 on success, 1
//! on any error with a single-line diagnostic on stderr.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use rvzk_prover::MethodId;

/// Compute the method id of a guest ELF image.
#[derive(Parser)]
#[command(name = "make-id")]
#[command(version)]
struct Args {
    /// Path to the guest ELF
    elf_in: PathBuf,

    /// Path the method-id bytes are written to
    id_out: PathBuf,
}

fn run(args: &Args) -> anyhow::Result<()> {
    let id = MethodId::from_elf_file(&args.elf_in)
        .with_context(|| format!("reading {}", args.elf_in.display()))?;
    fs::write(&args.id_out, id.as_bytes())
        .with_context(|| format!("writing {}", args.id_out.display()))?;
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Unable to make method id: {err:#}");
            ExitCode::FAILURE
        }
    }
}
