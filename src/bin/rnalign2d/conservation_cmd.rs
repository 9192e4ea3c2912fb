//! CLI for `rnalign2d conservation` (per-column report).
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::Args;
use rnalign2d::*;

#[derive(Debug, Args)]
pub struct ConservationCmd {
    /// Aligned records, or one structure per line with `--raw`.
    #[arg(long, value_name="FILE")]
    pub infile: PathBuf,
    /// Input holds bare structures, one per line.
    #[arg(long)]
    pub raw: bool,
    /// Output report (TSV).
    #[arg(long, default_value="conservation.tsv")]
    pub outfile: PathBuf,
}

pub fn run(cmd: ConservationCmd) -> Result<()> {
    let mut s = String::new();
    File::open(&cmd.infile).with_context(|| format!("open structures: {}", cmd.infile.display()))?.read_to_string(&mut s)?;
    let structures = if cmd.raw {
        parse_raw_structures(&s)
    } else {
        parse_records(&s).into_iter().map(|r| r.structure).collect()
    };
    check_equal_lengths(&structures)?;

    // TSV, 1-based columns
    let mut w = csv::WriterBuilder::new().delimiter(b'\t').from_path(&cmd.outfile)
        .with_context(|| format!("create {}", cmd.outfile.display()))?;
    w.write_record(["column", "symbols", "score"])?;
    for c in conservation_profile(&structures) {
        w.write_record([(c.column + 1).to_string(), c.distinct.to_string(), c.score.to_string()])?;
    }
    w.write_record(["mean".to_string(), String::new(), format!("{:.4}", score_by_conservation(&structures))])?;
    w.flush()?;
    Ok(())
}
