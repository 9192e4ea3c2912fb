//! CLI for `rnalign2d fix-pseudoknots`.
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::Args;
use rnalign2d::*;

#[derive(Debug, Args)]
pub struct PseudoknotsCmd {
    /// Records (`>name`, sequence, dot-bracket structure).
    #[arg(long, value_name="FILE")]
    pub infile: PathBuf,
    /// Records with re-levelled brackets.
    #[arg(long, default_value="fixed.txt")]
    pub outfile: PathBuf,
}

pub fn run(cmd: PseudoknotsCmd) -> Result<()> {
    let mut s = String::new();
    File::open(&cmd.infile).with_context(|| format!("open records: {}", cmd.infile.display()))?.read_to_string(&mut s)?;
    let mut records = parse_records(&s);
    for r in &mut records {
        let fixed = fix_pseudoknots(&r.structure).with_context(|| format!("record {}", r.name))?;
        if fixed != r.structure {
            log::info!("{}\n  before {}\n  after  {}", r.name, r.structure, fixed);
            r.structure = fixed;
        }
    }
    std::fs::write(&cmd.outfile, format_records(&records)).with_context(|| format!("write {}", cmd.outfile.display()))?;
    Ok(())
}
