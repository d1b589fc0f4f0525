use std::path::PathBuf;
use structopt::StructOpt;

use rearrgroup_lib::pipeline::group::{DiscardCondition, DiscardToggles, GroupOptions};

/// Arguments for the `group` command.
#[derive(Debug, Clone, StructOpt)]
#[structopt(
    name = "group",
    about = "Cluster discordant read pairs into rearrangement groups"
)]
pub struct GroupArgs {
    /// Coordinate-sorted BAM files, merged into a single stream.
    #[structopt(parse(from_os_str), required = true)]
    pub inputs: Vec<PathBuf>,

    /// Write rearrangement groups to this file rather than standard output.
    #[structopt(short, long, parse(from_os_str), default_value = "-")]
    pub output: PathBuf,

    /// Read annotation features from FILE (BED or range format, may be gzipped).
    #[structopt(short = "F", long = "features", parse(from_os_str), number_of_values = 1)]
    pub feature_files: Vec<PathBuf>,

    /// Omit reads in the locations encompassed by RANGE (`contig[:start[-end]]`).
    #[structopt(short = "i", long = "ignore", number_of_values = 1)]
    pub ignore_ranges: Vec<String>,

    /// ...or by the ranges listed in FILE.
    #[structopt(short = "I", long = "ignore-file", parse(from_os_str), number_of_values = 1)]
    pub ignore_files: Vec<PathBuf>,

    /// Maximum insert size for read groups without an MI field.
    #[structopt(short = "m", long)]
    pub max_insert: Option<i64>,

    /// Omit groups containing fewer than this many read pairs.
    #[structopt(short = "n", long, default_value = "2")]
    pub min_count: u32,

    /// Discard reads with mapping quality below this value.
    #[structopt(short = "q", long, default_value = "1")]
    pub min_quality: u8,

    /// Sample name for read pairs that are not in any read group.
    #[structopt(short = "s", long)]
    pub default_sample: Option<String>,

    /// Discard read pairs matching a condition: insertion, repeat or repetitive.
    #[structopt(short = "d", long = "discard", number_of_values = 1)]
    pub discard: Vec<DiscardCondition>,

    /// Keep read pairs matching a condition, overriding --discard.
    #[structopt(short = "k", long = "keep", number_of_values = 1)]
    pub keep: Vec<DiscardCondition>,
}

/// Normalised settings for one grouping run.
#[derive(Debug, Clone)]
pub struct GroupConfig {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub feature_files: Vec<PathBuf>,
    pub ignore_ranges: Vec<String>,
    pub ignore_files: Vec<PathBuf>,
    pub options: GroupOptions,
}

impl From<GroupArgs> for GroupConfig {
    fn from(args: GroupArgs) -> Self {
        let mut discards = DiscardToggles::default();
        for condition in args.discard {
            discards.set(condition, true);
        }
        for condition in args.keep {
            discards.set(condition, false);
        }

        GroupConfig {
            inputs: args.inputs,
            output: args.output,
            feature_files: args.feature_files,
            ignore_ranges: args.ignore_ranges,
            ignore_files: args.ignore_files,
            options: GroupOptions {
                min_count: args.min_count,
                min_quality: args.min_quality,
                default_max_insert: args.max_insert,
                default_sample: args.default_sample.filter(|s| !s.is_empty()),
                discards,
            },
        }
    }
}
