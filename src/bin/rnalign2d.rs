//! Command-line interface for the `rnalign2d` crate.
//!
//! Subcommands are implemented in separate files (modules) under `src/bin/rnalign2d/`:
//! - `refine_cmd.rs`
//! - `consensus_cmd.rs`
//! - `conservation_cmd.rs`
//! - `pseudoknots_cmd.rs`
//!
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name="rnalign2d", version=env!("CARGO_PKG_VERSION"), about="Structure-aware refinement of aligned RNA secondary structures", disable_help_subcommand=true)]
struct Cli {
    /// Log every optimizer step (same as RUST_LOG=debug).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Shift gaps so that paired regions line up across aligned structures.
    Refine(refine_cmd::RefineCmd),
    /// Majority consensus of aligned dot-bracket structures.
    Consensus(consensus_cmd::ConsensusCmd),
    /// Per-column conservation report (TSV).
    Conservation(conservation_cmd::ConservationCmd),
    /// Rewrite pseudoknot brackets with levels derived from pair crossings.
    FixPseudoknots(pseudoknots_cmd::PseudoknotsCmd),
}

#[path = "rnalign2d/refine_cmd.rs"] mod refine_cmd;
#[path = "rnalign2d/consensus_cmd.rs"] mod consensus_cmd;
#[path = "rnalign2d/conservation_cmd.rs"] mod conservation_cmd;
#[path = "rnalign2d/pseudoknots_cmd.rs"] mod pseudoknots_cmd;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .init();

    match cli.command {
        Command::Refine(cmd) => refine_cmd::run(cmd),
        Command::Consensus(cmd) => consensus_cmd::run(cmd),
        Command::Conservation(cmd) => conservation_cmd::run(cmd),
        Command::FixPseudoknots(cmd) => pseudoknots_cmd::run(cmd),
    }
}
