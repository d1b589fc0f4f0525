//! rearrgroup - Rearrangement grouping of discordant read pairs
//!
//! rearrgroup scans coordinate-sorted paired-end alignments, drops pairs that
//! are properly paired, poorly mapped, or lying in listed repeat or ignored
//! regions, and clusters the rest into candidate structural rearrangements.
//!
//! # Usage
//!
//! ```bash
//! # Group the pairs of a tumour/normal pair of BAM files
//! rearrgroup group -o groups.tsv tumour.bam normal.bam
//!
//! # Drop repeat-covered reads and annotate spanned transposons
//! rearrgroup group -F repeats.%AS.bed.gz -I ignore.%AS.bed -o groups.tsv tumour.bam
//!
//! # Untagged reads: name the sample and give its insert size
//! rearrgroup group -s sample1 -m 500 input.bam
//! ```

extern crate rearrgroup_lib;
pub mod commands;
use anyhow::Result;
use env_logger::Env;
use log::*;
use rearrgroup_lib::core::errors;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case", author, about)]
/// Rearrangement grouping of discordant read pairs
struct Args {
    #[structopt(subcommand)]
    subcommand: Subcommand,
}

#[derive(StructOpt)]
enum Subcommand {
    /// Cluster discordant read pairs into rearrangement groups
    Group(commands::GroupArgs),
}

impl Subcommand {
    fn run(self) -> Result<()> {
        match self {
            Subcommand::Group(args) => commands::run_group(args)?,
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    if let Err(err) = Args::from_args().subcommand.run() {
        if errors::is_broken_pipe(&err) {
            std::process::exit(0);
        }
        error!("{:#}", err);
        std::process::exit(1);
    }
    Ok(())
}
