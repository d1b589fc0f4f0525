//! Tab-separated group report: preamble, one line per group, trailer.

use std::collections::BTreeMap;
use std::io::Write;

use itertools::Itertools;

use crate::core::error::Result;
use crate::engine::read_filter::Discard;
use crate::engine::record::AlignmentHeader;
use crate::pipeline::group::feature::{FeatureIndex, Partition};
use crate::pipeline::group::grouper::GroupOptions;
use crate::pipeline::group::rearrangement::RearrangementGroup;

/// Per-reason read counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    pub total: u64,
    pub proper: u64,
    pub unmapped: u64,
    pub low_quality: u64,
    pub near_mate: u64,
    pub repeats: u64,
    pub repetitive: u64,
    pub ignored: u64,
    pub insertion: u64,
}

impl ReadStats {
    pub fn count(&mut self, reason: Discard) {
        self.add(reason, 1);
    }

    pub fn add(&mut self, reason: Discard, n: u64) {
        let counter = match reason {
            Discard::ProperPair => &mut self.proper,
            Discard::Unmapped => &mut self.unmapped,
            Discard::LowQuality => &mut self.low_quality,
            Discard::NearMate => &mut self.near_mate,
            Discard::Repeats => &mut self.repeats,
            Discard::Repetitive => &mut self.repetitive,
            Discard::Ignored => &mut self.ignored,
            Discard::Insertion => &mut self.insertion,
        };
        *counter += n;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupStats {
    pub total: u64,
    pub small: u64,
    pub emitted: u64,
}

/// Writes finished groups, dropping those with too few pairs and annotating
/// deletions that span transposon features.
pub struct ReportWriter<'a, W: Write> {
    out: W,
    header: &'a AlignmentHeader,
    features: &'a FeatureIndex,
    min_count: u32,
    stats: GroupStats,
}

impl<'a, W: Write> ReportWriter<'a, W> {
    pub fn new(out: W, header: &'a AlignmentHeader, features: &'a FeatureIndex, min_count: u32) -> Self {
        Self {
            out,
            header,
            features,
            min_count,
            stats: GroupStats::default(),
        }
    }

    pub fn stats(&self) -> &GroupStats {
        &self.stats
    }

    pub fn write_preamble(&mut self, inputs: &[&str], samples: &[String]) -> Result<()> {
        writeln!(
            self.out,
            "# Rearrangement groupings, generated by {} {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        )?;
        writeln!(self.out, "#\n# Input files:")?;
        for input in inputs {
            writeln!(self.out, "#INPUT\t{}", input)?;
        }

        if let Some(reference) = self.header.references.first() {
            if let Some(species) = reference.field("SP") {
                write!(self.out, "#\n#REFERENCE\tSP:{}", species)?;
                for tag in ["AS", "UR", "M5"] {
                    if let Some(value) = reference.field(tag) {
                        write!(self.out, "\t{}:{}", tag, value)?;
                    }
                }
                writeln!(self.out, "\n#")?;
            }
        }

        writeln!(self.out, "#NSAMPLES\t{}", samples.len())?;
        for (i, sample) in samples.iter().enumerate() {
            writeln!(self.out, "#SAMPLE\t{}\t{}", i + 1, sample)?;
        }
        Ok(())
    }

    /// Finalise a group: count it, then either drop it as too small or
    /// annotate and write it. Returns whether it was written.
    pub fn flush_group(&mut self, mut group: RearrangementGroup) -> Result<bool> {
        self.stats.total += 1;
        if group.total_count < self.min_count {
            self.stats.small += 1;
            return Ok(false);
        }

        group.notes = self.spanned_transposons(&group);
        self.write_group(&group)?;
        self.stats.emitted += 1;
        Ok(true)
    }

    /// Transposons that an intrachromosomal deletion group could be spanning.
    fn spanned_transposons(&self, group: &RearrangementGroup) -> Option<String> {
        let canonical = &group.canonical;
        if canonical.ref_id != canonical.mate_ref_id || !canonical.natural_orientation() {
            return None;
        }
        if self.features.is_empty(Partition::Transposon) {
            return None;
        }

        let low = group.overlap_l;
        let high = group.overlap_h;
        let min_length = high.pos3 - low.pos5 - group.max_insert;
        let contig = self.header.reference_name(canonical.ref_id as usize);

        let mut spanned: BTreeMap<&str, usize> = BTreeMap::new();
        for feature in self
            .features
            .intersecting(Partition::Transposon, contig, low.pos5, low.pos5 + group.max_insert)
            .filter(|f| f.start >= low.pos5 && f.end <= high.pos3 && f.len() >= min_length)
        {
            *spanned.entry(self.features.name(feature.name)).or_default() += 1;
        }

        if spanned.is_empty() {
            return None;
        }
        Some(
            spanned
                .into_iter()
                .map(|(name, n)| match n {
                    1 => name.to_string(),
                    _ => format!("{}*{}", name, n),
                })
                .join(" "),
        )
    }

    fn write_group(&mut self, group: &RearrangementGroup) -> Result<()> {
        let canonical = &group.canonical;
        write!(
            self.out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.header.reference_name(canonical.ref_id as usize),
            canonical.strand().symbol(),
            group.overlap_l.pos5,
            group.overlap_l.pos3,
            self.header.reference_name(canonical.mate_ref_id as usize),
            canonical.mate_strand().symbol(),
            group.overlap_h.pos5,
            group.overlap_h.pos3,
        )?;
        for sample in &group.samples {
            write!(self.out, "\t{}", sample.count)?;
        }
        write!(self.out, "\t{}", group.notes.as_deref().unwrap_or("."))?;
        for sample in &group.samples {
            match sample.count {
                0 => write!(self.out, "\t.")?,
                _ => write!(self.out, "\t{}", sample.read_names)?,
            }
        }
        writeln!(self.out)?;
        Ok(())
    }

    pub fn write_trailer(&mut self, reads: &ReadStats, options: &GroupOptions, ignores_active: bool) -> Result<()> {
        let out = &mut self.out;
        writeln!(out, "#")?;
        writeln!(out, "# Total reads scanned:\t{}", reads.total)?;
        writeln!(out, "# Reads discarded due to being")?;
        writeln!(out, "#   Properly paired:\t{}", reads.proper)?;
        writeln!(out, "#   (Half-)unmapped:\t{}", reads.unmapped)?;
        writeln!(out, "#   Near mate:\t\t{}", reads.near_mate)?;
        if options.min_quality > 0 {
            writeln!(out, "#   Low quality:\t{}", reads.low_quality)?;
        }
        if options.discards.insertion {
            writeln!(out, "#   Small insertion:\t{}", reads.insertion)?;
        }
        if options.discards.repeat {
            writeln!(out, "#   Repeat features:\t{}", reads.repeats)?;
        }
        if options.discards.repetitive {
            writeln!(out, "#   Repeat-mapped:\t{}", reads.repetitive)?;
        }
        if ignores_active {
            writeln!(out, "#   In ignored regions:\t{}", reads.ignored)?;
        }

        writeln!(out, "#")?;
        writeln!(out, "# Total groups found:\t{}", self.stats.total)?;
        if options.min_count >= 2 {
            writeln!(out, "# Rearrangement groups omitted due to being")?;
            writeln!(out, "#   < {} read pairs:\t{}", options.min_count, self.stats.small)?;
        }
        writeln!(out, "#")?;
        writeln!(out, "# Total groups emitted:\t{}", self.stats.emitted)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
