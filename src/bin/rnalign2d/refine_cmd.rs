//! CLI for `rnalign2d refine`.
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::Args;
use rnalign2d::*;

#[derive(Debug, Args)]
pub struct RefineCmd {
    /// Aligned records (`>name`, sequence, dot-bracket structure).
    #[arg(long, value_name="FILE")]
    pub infile: PathBuf,
    /// Refined records.
    #[arg(long, default_value="refined.txt")]
    pub outfile: PathBuf,
    /// Largest partner disagreement (columns) to repair.
    #[arg(long, default_value_t=5)]
    pub max_refinement: usize,
    /// Leave loop gaps where they are.
    #[arg(long)]
    pub no_center: bool,
    /// Number of refinement rounds.
    #[arg(long, default_value_t=1)]
    pub repeat: usize,
    /// Keep a move when `score_after * tolerance >= score_before`.
    #[arg(long, default_value_t=1.1)]
    pub tolerance: f64,
    /// Optimizer step budget per round.
    #[arg(long, default_value_t=10_000)]
    pub max_iterations: usize,
}

pub fn run(cmd: RefineCmd) -> Result<()> {
    let mut s = String::new();
    File::open(&cmd.infile).with_context(|| format!("open records: {}", cmd.infile.display()))?.read_to_string(&mut s)?;
    let records = parse_records(&s);
    let structures: Vec<&str> = records.iter().map(|r| r.structure.as_str()).collect();

    let params = RefineParams {
        max_diff: cmd.max_refinement,
        center: !cmd.no_center,
        repeat: cmd.repeat,
        score_tolerance: cmd.tolerance,
        max_iterations: cmd.max_iterations,
        ..Default::default()
    };
    let before = score_by_conservation(&structures);
    let report = refine_with_report(&structures, &params).context("refine structures")?;
    if !report.converged {
        log::warn!("refinement stopped at the iteration cap ({}); writing the partial result", cmd.max_iterations);
    }
    for (round, stats) in report.rounds.iter().enumerate() {
        log::info!(
            "round {}: {} moves kept, {} rejected, {} constant shifts, {} skipped",
            round + 1, stats.accepted, stats.rejected, stats.constant_shifts, stats.skipped
        );
    }
    log::info!("conservation {:.3} -> {:.3}", before, score_by_conservation(&report.structures));

    let mut refined = Vec::with_capacity(records.len());
    for (r, structure) in records.iter().zip(report.structures) {
        let sequence = interleave_sequence(&r.sequence, &structure).with_context(|| format!("record {}", r.name))?;
        refined.push(StructureRecord { name: r.name.clone(), sequence, structure });
    }
    std::fs::write(&cmd.outfile, format_records(&refined)).with_context(|| format!("write {}", cmd.outfile.display()))?;
    Ok(())
}
