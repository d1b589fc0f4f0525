//! Rearrangement grouping command
//!
//! Merges the input BAM files into one coordinate-sorted stream, loads the
//! ignore and feature files, and writes one report line per group of
//! discordant read pairs that support the same candidate rearrangement.

mod args;

use anyhow::{Context, Result};
use log::{info, warn};
use std::path::Path;

use rearrgroup_lib::core::prelude::{get_writer, make_parent_dirs, GroupError};
use rearrgroup_lib::engine::{BamSource, ReferenceSequence, StreamMerger};
use rearrgroup_lib::pipeline::group::{FeatureIndex, FeatureIndexBuilder, Grouper, Partition, ReadGroupRegistry};

use crate::commands::common::expand_reference_fields;

pub use args::{GroupArgs, GroupConfig};

/// Build the feature index from literal ranges, ignore files and feature
/// files, in that order.
fn load_features(config: &GroupConfig, reference: &ReferenceSequence) -> Result<FeatureIndex> {
    let mut builder = FeatureIndexBuilder::new();

    for range in &config.ignore_ranges {
        builder.insert_ignore_range(range)?;
    }

    for path in &config.ignore_files {
        let path = expand_reference_fields(path, reference)?;
        let n = builder
            .insert_ignore_file(&path)
            .with_context(|| format!("Failed to load ignore file {}", path.display()))?;
        info!("Loaded {} ignore intervals from {}", n, path.display());
    }

    for path in &config.feature_files {
        let path = expand_reference_fields(path, reference)?;
        let n = builder
            .insert_feature_file(&path)
            .with_context(|| format!("Failed to load features from {}", path.display()))?;
        info!("Loaded {} features from {}", n, path.display());
    }

    let index = builder.build();
    if config.options.discards.repeat && !config.feature_files.is_empty() && index.is_empty(Partition::Filter) {
        warn!("Repeat discarding is enabled but no filter:reads features were loaded");
    }
    Ok(index)
}

pub fn run_group(args: GroupArgs) -> Result<()> {
    let config = GroupConfig::from(args);
    if let Some(max_insert) = config.options.default_max_insert {
        if max_insert <= 0 {
            return Err(GroupError::Config(format!("--max-insert must be positive (got {})", max_insert)).into());
        }
    }

    let sources = config
        .inputs
        .iter()
        .map(|path| BamSource::open(path).with_context(|| format!("Failed to open {}", path.display())))
        .collect::<Result<Vec<_>>>()?;
    let mut merger = StreamMerger::new(sources)?;
    let header = merger.header().clone();
    let inputs: Vec<String> = merger.filenames().into_iter().map(str::to_string).collect();

    let reference = header.references.first().ok_or(GroupError::NoReferences)?;
    let features = load_features(&config, reference)?;

    let read_groups = ReadGroupRegistry::build(
        &header.read_groups,
        config.options.default_max_insert,
        config.options.default_sample.as_deref(),
    )?;
    info!(
        "Grouping {} input(s) across {} reference sequences and {} sample(s)",
        inputs.len(),
        header.references.len(),
        read_groups.sample_count()
    );

    if config.output != Path::new("-") {
        make_parent_dirs(&config.output)?;
    }
    let writer = get_writer(&config.output)
        .with_context(|| format!("Failed to create {}", config.output.display()))?;

    let mut grouper = Grouper::new(&header, &read_groups, &features, config.options.clone(), writer)?;
    let input_names: Vec<&str> = inputs.iter().map(String::as_str).collect();
    grouper.write_preamble(&input_names)?;
    grouper.group_alignments(&mut merger)?;
    grouper.write_trailer()?;

    let groups = *grouper.group_stats();
    grouper.finish()?;
    info!(
        "Wrote {} of {} groups to {}",
        groups.emitted,
        groups.total,
        config.output.display()
    );
    Ok(())
}
