//! The grouping scan.
//!
//! Records arrive coordinate-sorted. Each read is run through the discard
//! filters; of every surviving pair only the lesser read is clustered, so a
//! pair is seen once. Groups live in a [`GroupCollection`] bucketed by mate
//! contig and are flushed to the [`ReportWriter`] as soon as a sorted scan
//! can no longer extend them, or when the scan moves to a new contig.

use std::io::Write;
use std::str::FromStr;

use log::{debug, info};

use crate::core::error::{GroupError, Result};
use crate::engine::read_filter::{DefaultReadFilter, Discard, ReadFilter};
use crate::engine::record::{AlignmentHeader, AlignmentRecord, RecordStream};
use crate::pipeline::group::feature::{FeatureIndex, Partition};
use crate::pipeline::group::interval::Interval;
use crate::pipeline::group::read_group::{ReadGroupInfo, ReadGroupRegistry};
use crate::pipeline::group::rearrangement::{GroupCollection, RearrangementGroup};
use crate::pipeline::group::report::{GroupStats, ReadStats, ReportWriter};

/// Conditions that can be toggled with `--discard` / `--keep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardCondition {
    /// Intrachromosomal pairs in natural orientation with a short insert.
    Insertion,
    /// Reads lying within listed repeat features.
    Repeat,
    /// Reads flagged `XT:A:R` by the aligner.
    Repetitive,
}

impl FromStr for DiscardCondition {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "insertion" => Ok(DiscardCondition::Insertion),
            "repeat" => Ok(DiscardCondition::Repeat),
            "repetitive" => Ok(DiscardCondition::Repetitive),
            other => Err(format!(
                "Invalid condition '{}' (expected insertion, repeat or repetitive)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscardToggles {
    pub insertion: bool,
    pub repeat: bool,
    pub repetitive: bool,
}

impl Default for DiscardToggles {
    fn default() -> Self {
        Self {
            insertion: true,
            repeat: true,
            repetitive: false,
        }
    }
}

impl DiscardToggles {
    pub fn set(&mut self, condition: DiscardCondition, discard: bool) {
        match condition {
            DiscardCondition::Insertion => self.insertion = discard,
            DiscardCondition::Repeat => self.repeat = discard,
            DiscardCondition::Repetitive => self.repetitive = discard,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOptions {
    /// Groups with fewer pairs are omitted from the report.
    pub min_count: u32,
    pub min_quality: u8,
    /// Maximum insert for read groups lacking an `MI` field.
    pub default_max_insert: Option<i64>,
    /// Sample assigned to reads without an `RG` tag.
    pub default_sample: Option<String>,
    pub discards: DiscardToggles,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            min_count: 2,
            min_quality: 1,
            default_max_insert: None,
            default_sample: None,
            discards: DiscardToggles::default(),
        }
    }
}

/// Whether a lesser read and its mate look like a small insertion artifact:
/// same contig, natural orientation, template no longer than the library's
/// maximum insert.
fn apparent_insertion(record: &AlignmentRecord, info: &ReadGroupInfo) -> bool {
    record.ref_id == record.mate_ref_id && record.natural_orientation() && record.tlen <= info.max_insert
}

pub struct Grouper<'a, W: Write> {
    options: GroupOptions,
    header: &'a AlignmentHeader,
    read_groups: &'a ReadGroupRegistry,
    features: &'a FeatureIndex,
    read_filter: DefaultReadFilter,
    ignores_active: bool,
    active: GroupCollection,
    report: ReportWriter<'a, W>,
    read_stats: ReadStats,
}

impl<'a, W: Write> Grouper<'a, W> {
    pub fn new(
        header: &'a AlignmentHeader,
        read_groups: &'a ReadGroupRegistry,
        features: &'a FeatureIndex,
        options: GroupOptions,
        out: W,
    ) -> Result<Self> {
        if header.references.is_empty() {
            return Err(GroupError::NoReferences);
        }

        Ok(Self {
            read_filter: DefaultReadFilter::new(options.min_quality),
            ignores_active: !features.is_empty(Partition::Ignore),
            active: GroupCollection::new(header.references.len()),
            report: ReportWriter::new(out, header, features, options.min_count),
            read_stats: ReadStats::default(),
            options,
            header,
            read_groups,
            features,
        })
    }

    pub fn read_stats(&self) -> &ReadStats {
        &self.read_stats
    }

    pub fn group_stats(&self) -> &GroupStats {
        self.report.stats()
    }

    pub fn active_groups(&self) -> usize {
        self.active.len()
    }

    pub fn write_preamble(&mut self, inputs: &[&str]) -> Result<()> {
        self.report.write_preamble(inputs, self.read_groups.samples())
    }

    pub fn write_trailer(&mut self) -> Result<()> {
        self.report
            .write_trailer(&self.read_stats, &self.options, self.ignores_active)
    }

    /// Scan `input` to the end, then flush every remaining group.
    pub fn group_alignments<S: RecordStream>(&mut self, input: &mut S) -> Result<()> {
        while let Some(record) = input.next_record()? {
            self.process_record(record)?;
        }
        self.flush_all()?;

        info!(
            "Scanned {} reads; {} groups found, {} emitted",
            self.read_stats.total,
            self.report.stats().total,
            self.report.stats().emitted
        );
        Ok(())
    }

    fn reference_length(&self, ref_id: i32) -> Result<i64> {
        self.header
            .references
            .get(ref_id as usize)
            .map(|r| r.length)
            .ok_or_else(|| GroupError::Config(format!("reference index {} out of range", ref_id)))
    }

    fn contig_name(&self, ref_id: i32) -> Result<&'a str> {
        self.reference_length(ref_id)?;
        Ok(self.header.reference_name(ref_id as usize))
    }

    /// Feature-based checks on both ends' read spans, after the flag and
    /// quality filters have passed.
    fn span_discard(&self, record: &AlignmentRecord) -> Result<Option<Discard>> {
        let own = self.contig_name(record.ref_id)?;
        let mate = self.contig_name(record.mate_ref_id)?;
        let last = |pos: i64| pos + record.length - 1;

        if self.options.discards.repeat
            && (self.features.within_repeat(own, record.pos, last(record.pos))
                || self.features.within_repeat(mate, record.mate_pos, last(record.mate_pos)))
        {
            return Ok(Some(Discard::Repeats));
        }
        if self.options.discards.repetitive && record.xt == Some(b'R') {
            return Ok(Some(Discard::Repetitive));
        }
        if self.ignores_active
            && (self.features.within_ignored(own, record.pos, last(record.pos))
                || self.features.within_ignored(mate, record.mate_pos, last(record.mate_pos)))
        {
            return Ok(Some(Discard::Ignored));
        }
        Ok(None)
    }

    /// Run one record through the filters and, if it is the lesser read of
    /// a surviving pair, cluster it.
    pub fn process_record(&mut self, record: AlignmentRecord) -> Result<()> {
        self.read_stats.total += 1;

        let discard = match self.read_filter.filter_read(&record) {
            Some(reason) => Some(reason),
            None => self.span_discard(&record)?,
        };
        if let Some(reason) = discard {
            self.read_stats.count(reason);
            return Ok(());
        }

        if !record.less_than_mate() {
            return Ok(());
        }

        let read_groups = self.read_groups;
        let info = read_groups.find(&record)?;

        if self.options.discards.insertion && apparent_insertion(&record, info) {
            self.read_stats.add(Discard::Insertion, 2);
            return Ok(());
        }

        if self.active.contig() != Some(record.ref_id) {
            if let Some(previous) = self.active.contig() {
                debug!(
                    "Leaving {} with {} active groups",
                    self.header.reference_name(previous as usize),
                    self.active.len()
                );
            }
            self.flush_all()?;
        }

        let low = Interval::project(
            record.pos,
            record.strand(),
            record.length,
            self.reference_length(record.ref_id)?,
            info.max_insert,
        );
        let high = Interval::project(
            record.mate_pos,
            record.mate_strand(),
            record.length,
            self.reference_length(record.mate_ref_id)?,
            info.max_insert,
        );

        let mut matched = 0;
        let bucket = self.active.bucket_mut(record.mate_ref_id);
        let mut i = 0;
        while i < bucket.len() {
            if bucket[i].expired_by(&record, &low) {
                let group = bucket.remove(i);
                self.report.flush_group(group)?;
            } else {
                if bucket[i].matches(&record, &low, &high) {
                    bucket[i].insert(&record, &low, &high, info);
                    matched += 1;
                }
                i += 1;
            }
        }

        if matched == 0 {
            let group = RearrangementGroup::new(record, low, high, info, read_groups.sample_count());
            self.active.push(group);
        }
        Ok(())
    }

    /// Flush and clear every active group.
    pub fn flush_all(&mut self) -> Result<()> {
        let groups = self.active.drain_all();
        if !groups.is_empty() {
            debug!("Flushing {} groups", groups.len());
        }
        for group in groups {
            self.report.flush_group(group)?;
        }
        Ok(())
    }

    /// Flush the output and hand back the writer.
    pub fn finish(mut self) -> Result<W> {
        self.report.flush()?;
        Ok(self.report.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::merge::StreamMerger;
    use crate::engine::record::{
        ReadGroup, ReferenceSequence, VecSource, FLAG_FIRST_IN_PAIR, FLAG_MATE_REVERSE, FLAG_PAIRED,
        FLAG_PROPER_PAIR, FLAG_REVERSE, FLAG_SECOND_IN_PAIR,
    };
    use crate::pipeline::group::feature::FeatureIndexBuilder;
    use proptest::prelude::*;

    fn header() -> AlignmentHeader {
        AlignmentHeader {
            references: vec![
                ReferenceSequence::new("1", 1_000_000),
                ReferenceSequence::new("2", 1_000_000),
                ReferenceSequence::new("3", 1_000_000),
            ],
            read_groups: vec![ReadGroup::new("rg1").with_field("SM", "tumour").with_field("MI", "500")],
        }
    }

    /// Both reads of a pair: forward at `pos`, reverse mate at `mate_pos`.
    fn pair(name: &str, tid: i32, pos: i64, mate_tid: i32, mate_pos: i64) -> [AlignmentRecord; 2] {
        let base = AlignmentRecord {
            name: name.to_string(),
            mapq: 60,
            length: 100,
            read_group: Some("rg1".to_string()),
            ..Default::default()
        };
        let tlen = if tid == mate_tid { mate_pos + 100 - pos } else { 0 };
        [
            AlignmentRecord {
                ref_id: tid,
                pos,
                flag: FLAG_PAIRED | FLAG_MATE_REVERSE | FLAG_FIRST_IN_PAIR,
                mate_ref_id: mate_tid,
                mate_pos,
                tlen,
                ..base.clone()
            },
            AlignmentRecord {
                ref_id: mate_tid,
                pos: mate_pos,
                flag: FLAG_PAIRED | FLAG_REVERSE | FLAG_SECOND_IN_PAIR,
                mate_ref_id: tid,
                mate_pos: pos,
                tlen: -tlen,
                ..base
            },
        ]
    }

    fn sorted(pairs: &[[AlignmentRecord; 2]]) -> VecSource {
        let mut records: Vec<AlignmentRecord> = pairs.iter().flat_map(|p| p.iter().cloned()).collect();
        records.sort_by_key(|r| r.sort_key());
        VecSource::new("test.bam", header(), records)
    }

    struct Run {
        lines: Vec<String>,
        reads: ReadStats,
        groups: GroupStats,
    }

    fn run(pairs: &[[AlignmentRecord; 2]], features: &FeatureIndex, options: GroupOptions) -> Run {
        let header = header();
        let registry = ReadGroupRegistry::build(&header.read_groups, options.default_max_insert, None).unwrap();
        let mut source = sorted(pairs);
        let mut grouper = Grouper::new(&header, &registry, features, options, Vec::new()).unwrap();
        grouper.group_alignments(&mut source).unwrap();
        let reads = *grouper.read_stats();
        let groups = *grouper.group_stats();
        let text = String::from_utf8(grouper.finish().unwrap()).unwrap();
        Run {
            lines: text.lines().map(str::to_string).collect(),
            reads,
            groups,
        }
    }

    #[test]
    fn matching_pairs_form_one_group() {
        let pairs = [pair("a", 0, 1_000, 1, 50_000), pair("b", 0, 1_200, 1, 50_100)];
        let out = run(&pairs, &FeatureIndex::default(), GroupOptions::default());

        assert_eq!(out.lines, vec!["1\t+\t1200\t1500\t2\t-\t49700\t50100\t2\t.\ta;b"]);
        assert_eq!(out.groups, GroupStats { total: 1, small: 0, emitted: 1 });
        assert_eq!(out.reads.total, 4);
    }

    #[test]
    fn lone_pair_is_too_small() {
        let out = run(&[pair("a", 0, 1_000, 1, 50_000)], &FeatureIndex::default(), GroupOptions::default());
        assert!(out.lines.is_empty());
        assert_eq!(out.groups, GroupStats { total: 1, small: 1, emitted: 0 });
    }

    #[test]
    fn pairs_in_ignored_regions_are_dropped() {
        let mut builder = FeatureIndexBuilder::new();
        builder.insert_ignore_range("1:900-1,200").unwrap();
        let features = builder.build();

        let out = run(&[pair("a", 0, 1_000, 1, 50_000)], &features, GroupOptions::default());
        assert_eq!(out.reads.ignored, 2);
        assert_eq!(out.groups.total, 0);
    }

    #[test]
    fn contig_change_flushes_active_groups() {
        let header = header();
        let registry = ReadGroupRegistry::build(&header.read_groups, None, None).unwrap();
        let features = FeatureIndex::default();
        let options = GroupOptions {
            min_count: 1,
            ..Default::default()
        };
        let mut grouper = Grouper::new(&header, &registry, &features, options, Vec::new()).unwrap();

        let [a, _] = pair("a", 0, 1_000, 1, 50_000);
        let [b, _] = pair("b", 0, 9_000, 2, 70_000);
        grouper.process_record(a).unwrap();
        grouper.process_record(b).unwrap();
        assert_eq!(grouper.active_groups(), 2);
        assert_eq!(grouper.group_stats().total, 0);

        let [c, _] = pair("c", 1, 5_000, 2, 80_000);
        grouper.process_record(c).unwrap();
        assert_eq!(grouper.group_stats().emitted, 2);
        assert_eq!(grouper.active_groups(), 1);

        let text = String::from_utf8(grouper.finish().unwrap()).unwrap();
        let contigs: Vec<&str> = text.lines().map(|l| l.split('\t').next().unwrap()).collect();
        assert_eq!(contigs, vec!["1", "1"]);
    }

    #[test]
    fn passed_groups_are_flushed_mid_contig() {
        let pairs = [
            pair("a", 0, 1_000, 1, 50_000),
            pair("b", 0, 1_100, 1, 50_050),
            pair("c", 0, 4_000, 1, 90_000),
            pair("d", 0, 4_050, 1, 90_020),
        ];
        let out = run(&pairs, &FeatureIndex::default(), GroupOptions::default());
        assert_eq!(out.lines.len(), 2);
        assert!(out.lines[0].ends_with("a;b"));
        assert!(out.lines[1].ends_with("c;d"));
    }

    #[test]
    fn pair_joins_every_group_it_matches() {
        // a and b share the low end but not the high end; c bridges both.
        let pairs = [
            pair("a", 0, 1_000, 1, 50_000),
            pair("b", 0, 1_400, 1, 50_600),
            pair("c", 0, 1_450, 1, 50_200),
        ];
        let out = run(&pairs, &FeatureIndex::default(), GroupOptions::default());

        assert_eq!(
            out.lines,
            vec![
                "1\t+\t1450\t1500\t2\t-\t49800\t50100\t2\t.\ta;c",
                "1\t+\t1450\t1900\t2\t-\t50200\t50300\t2\t.\tb;c",
            ]
        );
        assert_eq!(out.groups, GroupStats { total: 2, small: 0, emitted: 2 });
    }

    #[test]
    fn passed_group_on_other_strand_stays_active() {
        let header = header();
        let registry = ReadGroupRegistry::build(&header.read_groups, None, None).unwrap();
        let features = FeatureIndex::default();
        let options = GroupOptions {
            min_count: 1,
            ..Default::default()
        };
        let mut grouper = Grouper::new(&header, &registry, &features, options, Vec::new()).unwrap();

        // Reverse read at 1000: low overlap [600, 1100].
        let [mut rev, _] = pair("r", 0, 1_000, 1, 50_000);
        rev.flag = FLAG_PAIRED | FLAG_REVERSE | FLAG_FIRST_IN_PAIR;
        grouper.process_record(rev).unwrap();

        // Forward read well past it, same mate contig.
        let [fwd, _] = pair("f", 0, 5_000, 1, 90_000);
        grouper.process_record(fwd).unwrap();
        assert_eq!(grouper.group_stats().total, 0);
        assert_eq!(grouper.active_groups(), 2);

        // A later forward read retires only the forward group.
        let [next, _] = pair("g", 0, 9_000, 1, 95_000);
        grouper.process_record(next).unwrap();
        assert_eq!(grouper.group_stats().total, 1);
        assert_eq!(grouper.active_groups(), 2);

        let text = String::from_utf8(grouper.finish().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("\tf"));
    }

    #[test]
    fn filters_are_counted_per_reason() {
        let mut proper = pair("p", 0, 1_000, 0, 1_300);
        for r in proper.iter_mut() {
            r.flag |= FLAG_PROPER_PAIR;
        }
        let mut low = pair("q", 0, 2_000, 1, 60_000);
        low[0].mapq = 0;
        low[1].mapq = 0;
        let near = pair("n", 0, 3_000, 2, 3_005);
        let mut repetitive = pair("x", 0, 4_000, 1, 70_000);
        repetitive[0].xt = Some(b'R');
        let insertion = pair("i", 0, 5_000, 0, 5_200);

        let options = GroupOptions {
            discards: DiscardToggles {
                repetitive: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let out = run(
            &[proper, low, near, repetitive, insertion],
            &FeatureIndex::default(),
            options,
        );

        assert_eq!(out.reads.total, 10);
        assert_eq!(out.reads.proper, 2);
        assert_eq!(out.reads.low_quality, 2);
        assert_eq!(out.reads.near_mate, 2);
        assert_eq!(out.reads.repetitive, 1);
        assert_eq!(out.reads.insertion, 2);
        // The mate of the repeat-mapped read still reaches clustering but is
        // the greater read, so nothing is grouped.
        assert_eq!(out.groups.total, 0);
    }

    #[test]
    fn repeat_features_discard_reads() {
        let mut builder = FeatureIndexBuilder::new();
        let text = "track action=filter:reads\n2\t49990\t50095\tAluSx\n";
        builder
            .insert_reader(std::io::Cursor::new(text), std::path::Path::new("r.bed"), None)
            .unwrap();
        let features = builder.build();

        let out = run(&[pair("a", 0, 1_000, 1, 50_000)], &features, GroupOptions::default());
        assert_eq!(out.reads.repeats, 2);

        let kept = GroupOptions {
            discards: DiscardToggles {
                repeat: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let out = run(&[pair("a", 0, 1_000, 1, 50_000)], &features, kept);
        assert_eq!(out.reads.repeats, 0);
        assert_eq!(out.groups.total, 1);
    }

    #[test]
    fn unknown_read_group_aborts() {
        let header = header();
        let registry = ReadGroupRegistry::build(&header.read_groups, None, None).unwrap();
        let features = FeatureIndex::default();
        let mut grouper = Grouper::new(&header, &registry, &features, GroupOptions::default(), Vec::new()).unwrap();
        let [mut a, _] = pair("a", 0, 1_000, 1, 50_000);
        a.read_group = Some("rg9".to_string());
        assert!(matches!(
            grouper.process_record(a),
            Err(GroupError::UnknownReadGroup { .. })
        ));
    }

    #[test]
    fn empty_reference_list_is_rejected() {
        let header = AlignmentHeader::default();
        let registry = ReadGroupRegistry::build(&[], Some(500), Some("pooled")).unwrap();
        let features = FeatureIndex::default();
        assert!(matches!(
            Grouper::new(&header, &registry, &features, GroupOptions::default(), Vec::new()),
            Err(GroupError::NoReferences)
        ));
    }

    #[test]
    fn discard_conditions_parse() {
        assert_eq!("repeat".parse::<DiscardCondition>(), Ok(DiscardCondition::Repeat));
        assert!("everything".parse::<DiscardCondition>().is_err());

        let mut toggles = DiscardToggles::default();
        toggles.set(DiscardCondition::Insertion, false);
        toggles.set(DiscardCondition::Repetitive, true);
        assert_eq!(
            toggles,
            DiscardToggles {
                insertion: false,
                repeat: true,
                repetitive: true
            }
        );
    }

    proptest! {
        #[test]
        fn every_pair_is_grouped_once_with_consistent_counts(
            specs in prop::collection::vec((0i32..2, 1i64..20_000, 1i64..20_000), 1..25)
        ) {
            let pairs: Vec<[AlignmentRecord; 2]> = specs
                .iter()
                .enumerate()
                .map(|(i, &(tid, pos, mate_pos))| pair(&format!("p{}", i), tid, pos, tid + 1, mate_pos))
                .collect();
            let clustered = specs
                .iter()
                .filter(|&&(_, pos, mate_pos)| (pos - mate_pos).abs() >= 10)
                .count();

            let header = header();
            let registry = ReadGroupRegistry::build(&header.read_groups, None, None).unwrap();
            let features = FeatureIndex::default();
            let options = GroupOptions { min_count: 1, ..Default::default() };
            let mut source = StreamMerger::new(vec![sorted(&pairs)]).unwrap();
            let mut grouper = Grouper::new(&header, &registry, &features, options, Vec::new()).unwrap();
            grouper.group_alignments(&mut source).unwrap();
            let stats = *grouper.group_stats();
            let text = String::from_utf8(grouper.finish().unwrap()).unwrap();

            let mut seen = std::collections::BTreeSet::new();
            let mut lines = 0;
            for line in text.lines() {
                lines += 1;
                let fields: Vec<&str> = line.split('\t').collect();
                let count: usize = fields[8].parse().unwrap();
                let names: Vec<&str> = fields[10].split(';').collect();
                prop_assert_eq!(count, names.len());
                seen.extend(names.into_iter().map(str::to_string));
            }
            prop_assert_eq!(lines as u64, stats.emitted);
            prop_assert_eq!(stats.total, stats.emitted);
            prop_assert_eq!(seen.len(), clustered);
        }
    }
}
