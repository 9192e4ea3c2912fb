//! CLI for `rnalign2d consensus`.
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::Args;
use rnalign2d::*;

#[derive(Debug, Args)]
pub struct ConsensusCmd {
    /// Aligned records, or one structure per line with `--raw`.
    #[arg(long, value_name="FILE")]
    pub infile: PathBuf,
    /// Input holds bare structures, one per line.
    #[arg(long)]
    pub raw: bool,
    /// Fraction of structures that must share a symbol (0.0..=1.0).
    #[arg(long, default_value_t=0.5)]
    pub threshold: f64,
    /// Output file; stdout when omitted.
    #[arg(long)]
    pub outfile: Option<PathBuf>,
}

pub fn run(cmd: ConsensusCmd) -> Result<()> {
    let mut s = String::new();
    File::open(&cmd.infile).with_context(|| format!("open structures: {}", cmd.infile.display()))?.read_to_string(&mut s)?;
    let structures = if cmd.raw {
        parse_raw_structures(&s)
    } else {
        parse_records(&s).into_iter().map(|r| r.structure).collect()
    };
    let params = ConsensusParams { threshold: cmd.threshold, ..Default::default() };
    let cons = consensus_structure(&structures, &params)?;
    match &cmd.outfile {
        Some(path) => std::fs::write(path, format!("{cons}\n")).with_context(|| format!("write {}", path.display()))?,
        None => println!("{cons}"),
    }
    Ok(())
}
