//! Feature intervals used to filter and annotate read pairs.
//!
//! Features come from BED-like text files (optionally gzipped) whose `track`
//! lines carry an `action` that routes the following features into one of
//! three partitions:
//!
//! | action                | partition                 |
//! |-----------------------|---------------------------|
//! | `ignore`              | [`Partition::Ignore`]     |
//! | `filter:reads`        | [`Partition::Filter`]     |
//! | `annotate:transposon` | [`Partition::Transposon`] |
//!
//! A feature line is either tab-delimited BED (`contig zstart end [name]`) or
//! a bare interval (`contig[:start[-end]]`, 1-based, inclusive). Each
//! partition is held as one [`Lapper`] per contig so range queries return
//! features in start order.

use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;

use log::debug;
use rust_lapper::{Interval as LapperInterval, Lapper};
use rustc_hash::FxHashMap;

use crate::core::error::{GroupError, Result};
use crate::core::intern::{NameId, NameInterner};
use crate::core::io::open_text_reader;

/// End coordinate used for intervals that name a whole contig.
pub const WHOLE_CONTIG_END: i64 = i32::MAX as i64;

/// Uncovered bases tolerated by [`FeatureIndex::within_repeat`].
pub const REPEAT_TOLERANCE: i64 = 10;

const ACTION_KEYS: [&str; 2] = ["rearrgroup_action", "action"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Ignore,
    Filter,
    Transposon,
}

impl Partition {
    fn slot(self) -> usize {
        match self {
            Partition::Ignore => 0,
            Partition::Filter => 1,
            Partition::Transposon => 2,
        }
    }
}

impl FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ignore" => Ok(Partition::Ignore),
            "filter:reads" => Ok(Partition::Filter),
            "annotate:transposon" => Ok(Partition::Transposon),
            other => Err(format!("Invalid action ('{}')", other)),
        }
    }
}

/// Closed, 1-based interval on a named contig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqInterval {
    pub contig: String,
    pub start: i64,
    pub end: i64,
}

fn parse_coord(text: &str) -> Option<i64> {
    let cleaned: String = text.chars().filter(|&c| c != ',').collect();
    cleaned.trim().parse::<i64>().ok()
}

impl SeqInterval {
    pub fn new<S: Into<String>>(contig: S, start: i64, end: i64) -> Self {
        Self {
            contig: contig.into(),
            start,
            end,
        }
    }

    /// Build from BED-style 0-based, half-open coordinates.
    pub fn from_zero_based<S: Into<String>>(contig: S, zstart: i64, end: i64) -> Self {
        Self::new(contig, zstart + 1, end)
    }

    #[inline]
    pub fn len(&self) -> i64 {
        (self.end - self.start + 1).max(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

impl FromStr for SeqInterval {
    type Err = GroupError;

    /// Parse `contig`, `contig:start`, `contig:start-` or `contig:start-end`.
    /// A missing end extends to the end of the contig.
    fn from_str(text: &str) -> Result<Self> {
        let text = text.trim();
        let invalid = || GroupError::Interval(text.to_string());

        let (contig, range) = match text.rfind(':') {
            Some(colon) => (&text[..colon], Some(&text[colon + 1..])),
            None => (text, None),
        };
        if contig.is_empty() {
            return Err(invalid());
        }

        let (start, end) = match range {
            None => (1, WHOLE_CONTIG_END),
            Some(range) => match range.split_once('-') {
                Some((start, end)) if end.trim().is_empty() => {
                    (parse_coord(start).ok_or_else(invalid)?, WHOLE_CONTIG_END)
                }
                Some((start, end)) => (
                    parse_coord(start).ok_or_else(invalid)?,
                    parse_coord(end).ok_or_else(invalid)?,
                ),
                None => (parse_coord(range).ok_or_else(invalid)?, WHOLE_CONTIG_END),
            },
        };
        if start < 1 || end < start {
            return Err(invalid());
        }

        Ok(SeqInterval::new(contig, start, end))
    }
}

/// One line of a feature file, classified before any field parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind<'a> {
    Skip,
    Track(&'a str),
    Feature(&'a str),
}

fn classify(line: &str) -> LineKind<'_> {
    if line.trim().is_empty() || line.starts_with('#') || line.starts_with("browser") {
        LineKind::Skip
    } else if line.starts_with("track") {
        LineKind::Track(line)
    } else {
        LineKind::Feature(line)
    }
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Parse a metadata line of the form
/// `KEYWORD KEY=VALUE KEY="QUOTED \"VALUE\"" ...` into key/value pairs.
/// The leading keyword is stored under the empty key.
fn parse_metadata(line: &str) -> std::result::Result<FxHashMap<String, String>, String> {
    let mut dict = FxHashMap::default();
    let mut pos = line.find(is_blank).unwrap_or(line.len());
    dict.insert(String::new(), line[..pos].to_string());

    loop {
        match line[pos..].find(|c: char| !is_blank(c)) {
            Some(offset) => pos += offset,
            None => break,
        }

        let eq = pos + line[pos..].find('=').ok_or("No equals")?;
        let key = line[pos..eq].to_string();
        pos = eq + 1;

        let quote = line[pos..].chars().next().filter(|&c| c == '\'' || c == '"');
        let value = match quote {
            Some(quote) => {
                pos += 1;
                let mut value = String::new();
                loop {
                    let stop = line[pos..]
                        .find(|c: char| c == quote || c == '\\')
                        .map(|offset| pos + offset)
                        .ok_or("Unterminated quotes")?;
                    value.push_str(&line[pos..stop]);
                    pos = stop + 1;
                    if line[stop..].starts_with('\\') {
                        let escaped = line[pos..].chars().next().ok_or("Invalid escape")?;
                        value.push(escaped);
                        pos += escaped.len_utf8();
                    } else {
                        break;
                    }
                }
                value
            }
            None => {
                let stop = line[pos..]
                    .find(is_blank)
                    .map(|offset| pos + offset)
                    .unwrap_or(line.len());
                let value = line[pos..stop].to_string();
                pos = stop;
                value
            }
        };
        dict.insert(key, value);
    }

    Ok(dict)
}

/// Partition selected by a `track` line, `None` when it carries no action.
fn track_action(line: &str) -> std::result::Result<Option<Partition>, String> {
    let dict = parse_metadata(line)?;
    ACTION_KEYS
        .iter()
        .find_map(|key| dict.get(*key))
        .map(|value| value.parse::<Partition>())
        .transpose()
}

fn parse_feature(line: &str) -> std::result::Result<(SeqInterval, String), String> {
    if line.contains('\t') {
        let mut fields = line.split_whitespace();
        let (contig, zstart, end) = match (fields.next(), fields.next(), fields.next()) {
            (Some(contig), Some(zstart), Some(end)) => (contig, zstart, end),
            _ => return Err("too few BED fields".to_string()),
        };
        let zstart = zstart
            .parse::<i64>()
            .map_err(|_| format!("invalid BED start ('{}')", zstart))?;
        let end = end
            .parse::<i64>()
            .map_err(|_| format!("invalid BED end ('{}')", end))?;
        if zstart < 0 || end < zstart {
            return Err(format!("invalid BED interval ({}-{})", zstart, end));
        }
        let name = fields.next().unwrap_or("").to_string();
        Ok((SeqInterval::from_zero_based(contig, zstart, end), name))
    } else {
        let interval = line.parse::<SeqInterval>().map_err(|e| e.to_string())?;
        Ok((interval, String::new()))
    }
}

/// A feature returned by a range query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feature {
    pub start: i64,
    pub end: i64,
    pub name: NameId,
}

impl Feature {
    #[inline]
    pub fn len(&self) -> i64 {
        self.end - self.start + 1
    }
}

type ContigIntervals = FxHashMap<String, Vec<LapperInterval<u64, NameId>>>;

/// Accumulates features from files and literal ranges.
#[derive(Debug, Default)]
pub struct FeatureIndexBuilder {
    names: NameInterner,
    partitions: [ContigIntervals; 3],
}

impl FeatureIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, partition: Partition, interval: &SeqInterval, name: &str) {
        let name = match partition {
            Partition::Ignore => self.names.intern(""),
            _ => self.names.intern(name),
        };
        self.partitions[partition.slot()]
            .entry(interval.contig.clone())
            .or_default()
            .push(LapperInterval {
                start: (interval.start - 1).max(0) as u64,
                stop: interval.end.max(0) as u64,
                val: name,
            });
    }

    /// Add a literal ignore range such as `chr2:1,000-2,000`.
    pub fn insert_ignore_range(&mut self, text: &str) -> Result<()> {
        let interval = text.parse::<SeqInterval>()?;
        self.insert(Partition::Ignore, &interval, "");
        Ok(())
    }

    /// Read features from `reader`, returning how many were inserted.
    ///
    /// With `forced` set, every `track` line must select that same partition.
    pub fn insert_reader<R: BufRead>(
        &mut self,
        reader: R,
        path: &Path,
        forced: Option<Partition>,
    ) -> Result<usize> {
        let mut action = forced;
        let mut count = 0;

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            let lineno = i + 1;

            match classify(line) {
                LineKind::Skip => {}
                LineKind::Track(text) => {
                    action = track_action(text).map_err(|msg| GroupError::parse(path, lineno, msg))?;
                    if forced.is_some() && action != forced {
                        return Err(GroupError::parse(path, lineno, "Overridden action"));
                    }
                }
                LineKind::Feature(text) => {
                    if let Some(partition) = action {
                        let (interval, name) =
                            parse_feature(text).map_err(|msg| GroupError::parse(path, lineno, msg))?;
                        self.insert(partition, &interval, &name);
                        count += 1;
                    }
                }
            }
        }

        debug!("Read {} features from {}", count, path.display());
        Ok(count)
    }

    pub fn insert_file<P: AsRef<Path>>(&mut self, path: P, forced: Option<Partition>) -> Result<usize> {
        let path = path.as_ref();
        let reader = open_text_reader(path)?;
        self.insert_reader(reader, path, forced)
    }

    /// Load an ignore file; every feature goes to the ignore partition.
    pub fn insert_ignore_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        self.insert_file(path, Some(Partition::Ignore))
    }

    /// Load an annotation feature file, which must yield at least one feature.
    pub fn insert_feature_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        match self.insert_file(path, None)? {
            0 => Err(GroupError::NoFeatures(path.to_path_buf())),
            n => Ok(n),
        }
    }

    pub fn build(self) -> FeatureIndex {
        let [ignore, filter, transposon] = self.partitions;
        let to_lappers = |intervals: ContigIntervals| -> FxHashMap<String, Lapper<u64, NameId>> {
            intervals
                .into_iter()
                .map(|(contig, ivs)| (contig, Lapper::new(ivs)))
                .collect()
        };
        FeatureIndex {
            names: self.names,
            partitions: [to_lappers(ignore), to_lappers(filter), to_lappers(transposon)],
        }
    }
}

/// Range-queryable feature partitions.
#[derive(Debug, Default)]
pub struct FeatureIndex {
    names: NameInterner,
    partitions: [FxHashMap<String, Lapper<u64, NameId>>; 3],
}

impl FeatureIndex {
    pub fn name(&self, id: NameId) -> &str {
        self.names.resolve(id)
    }

    /// Number of features held in `partition`.
    pub fn len(&self, partition: Partition) -> usize {
        self.partitions[partition.slot()]
            .values()
            .map(|lapper| lapper.len())
            .sum()
    }

    pub fn is_empty(&self, partition: Partition) -> bool {
        self.len(partition) == 0
    }

    /// Features of `partition` intersecting `contig:[start, end]`, in start order.
    pub fn intersecting<'a>(
        &'a self,
        partition: Partition,
        contig: &str,
        start: i64,
        end: i64,
    ) -> impl Iterator<Item = Feature> + 'a {
        let query_start = (start - 1).max(0) as u64;
        let query_stop = end.max(0) as u64;
        self.partitions[partition.slot()]
            .get(contig)
            .into_iter()
            .flat_map(move |lapper| lapper.find(query_start, query_stop))
            .map(|iv| Feature {
                start: iv.start as i64 + 1,
                end: iv.stop as i64,
                name: iv.val,
            })
    }

    /// Whether `contig:[start, end]` is covered by features of `partition`,
    /// leaving at most `max_uncovered` positions uncovered.
    pub fn within(&self, partition: Partition, contig: &str, start: i64, end: i64, max_uncovered: i64) -> bool {
        let length = (end - start + 1).max(0);
        let mut covered = 0;
        // first position of the target not yet covered
        let mut pos = start;

        for feature in self.intersecting(partition, contig, start, end) {
            if pos > end {
                break;
            }
            if feature.end >= pos {
                let next = (feature.end + 1).min(end + 1);
                covered += next - feature.start.max(pos);
                pos = next;
            }
        }

        covered + max_uncovered >= length
    }

    pub fn within_repeat(&self, contig: &str, start: i64, end: i64) -> bool {
        self.within(Partition::Filter, contig, start, end, REPEAT_TOLERANCE)
    }

    pub fn within_ignored(&self, contig: &str, start: i64, end: i64) -> bool {
        self.within(Partition::Ignore, contig, start, end, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use proptest::prelude::*;
    use std::fs::File;
    use std::io::{Cursor, Write};
    use tempfile::tempdir;

    fn load(text: &str, forced: Option<Partition>) -> Result<(usize, FeatureIndex)> {
        let mut builder = FeatureIndexBuilder::new();
        let n = builder.insert_reader(Cursor::new(text), Path::new("test.bed"), forced)?;
        Ok((n, builder.build()))
    }

    #[test]
    fn parses_bare_intervals() {
        assert_eq!(
            "chr2:1,000-2,000".parse::<SeqInterval>().unwrap(),
            SeqInterval::new("chr2", 1000, 2000)
        );
        assert_eq!(
            "chrX".parse::<SeqInterval>().unwrap(),
            SeqInterval::new("chrX", 1, WHOLE_CONTIG_END)
        );
        assert_eq!(
            "HLA-A*01:01:500".parse::<SeqInterval>().unwrap(),
            SeqInterval::new("HLA-A*01:01", 500, WHOLE_CONTIG_END)
        );
        assert!("chr1:20-10".parse::<SeqInterval>().is_err());
        assert!("chr1:abc".parse::<SeqInterval>().is_err());
    }

    #[test]
    fn metadata_handles_quotes_and_escapes() {
        let dict = parse_metadata(r#"track name="Simple \"repeats\"" action='filter:reads' visibility=2"#).unwrap();
        assert_eq!(dict[""], "track");
        assert_eq!(dict["name"], "Simple \"repeats\"");
        assert_eq!(dict["action"], "filter:reads");
        assert_eq!(dict["visibility"], "2");

        assert_eq!(parse_metadata("track name").unwrap_err(), "No equals");
        assert_eq!(parse_metadata("track name=\"open").unwrap_err(), "Unterminated quotes");
        assert_eq!(parse_metadata("track name=\"x\\").unwrap_err(), "Invalid escape");
    }

    #[test]
    fn track_lines_route_features() {
        let text = "\
# repeats and transposons
browser position chr1
chr1\t0\t100\tunrouted
track name=rep action=filter:reads
chr1\t100\t200\tsimple
chr1:500-600
track name=te rearrgroup_action=annotate:transposon action=ignore
chr1\t1000\t1300\tAluY
track name=off
chr1\t5000\t6000\tdropped
";
        let (n, index) = load(text, None).unwrap();
        assert_eq!(n, 3);
        assert_eq!(index.len(Partition::Filter), 2);
        assert_eq!(index.len(Partition::Transposon), 1);
        assert!(index.is_empty(Partition::Ignore));

        let te: Vec<Feature> = index.intersecting(Partition::Transposon, "chr1", 1, 2000).collect();
        assert_eq!(te.len(), 1);
        assert_eq!((te[0].start, te[0].end), (1001, 1300));
        assert_eq!(index.name(te[0].name), "AluY");
    }

    #[test]
    fn errors_carry_file_and_line() {
        let err = load("track action=bogus\n", None).unwrap_err();
        assert_eq!(err.to_string(), "test.bed:1: Invalid action ('bogus')");

        let err = load("track action=ignore\nchr1\t10\n", None).unwrap_err();
        assert!(matches!(err, GroupError::Parse { line: 2, .. }));

        let err = load("chr1:1-5\ntrack action=filter:reads\n", Some(Partition::Ignore)).unwrap_err();
        assert_eq!(err.to_string(), "test.bed:2: Overridden action");
    }

    #[test]
    fn forced_action_applies_without_track_lines() {
        let (n, index) = load("chr3:100-200\nchr3\t400\t500\tnamed\n", Some(Partition::Ignore)).unwrap();
        assert_eq!(n, 2);
        assert_eq!(index.len(Partition::Ignore), 2);
        assert!(index.within_ignored("chr3", 120, 180));
        assert!(!index.within_ignored("chr3", 190, 260));
    }

    #[test]
    fn feature_file_without_actions_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.bed");
        std::fs::write(&path, "chr1\t0\t100\tx\n").unwrap();
        let mut builder = FeatureIndexBuilder::new();
        assert!(matches!(
            builder.insert_feature_file(&path),
            Err(GroupError::NoFeatures(_))
        ));
    }

    #[test]
    fn reads_gzipped_feature_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("repeats.bed.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder
            .write_all(b"track action=filter:reads\nchr7\t99\t200\tL1\nchr7\t150\t400\tL2\n")
            .unwrap();
        encoder.finish().unwrap();

        let mut builder = FeatureIndexBuilder::new();
        assert_eq!(builder.insert_feature_file(&path).unwrap(), 2);
        let index = builder.build();
        assert!(index.within_repeat("chr7", 100, 400));
        assert!(index.within_repeat("chr7", 95, 400));
        assert!(!index.within_repeat("chr7", 80, 420));
    }

    #[test]
    fn within_skips_recovered_spans() {
        let (_, index) = load(
            "track action=filter:reads\nchr1:10-50\nchr1:20-30\nchr1:45-60\nchr1:70-80\n",
            None,
        )
        .unwrap();
        // [10, 60] covered; [61, 69] uncovered; [70, 80] covered.
        assert!(index.within(Partition::Filter, "chr1", 10, 80, 9));
        assert!(!index.within(Partition::Filter, "chr1", 10, 80, 8));
        assert!(index.within(Partition::Filter, "chr1", 1, 60, 9));
        assert!(!index.within(Partition::Filter, "chr2", 10, 20, 0));
    }

    #[test]
    fn empty_index_only_covers_empty_targets() {
        let index = FeatureIndex::default();
        assert!(!index.within(Partition::Filter, "chr1", 10, 10, 0));
        assert!(index.within(Partition::Filter, "chr1", 10, 9, 0));
    }

    proptest! {
        #[test]
        fn within_matches_uncovered_count(
            features in prop::collection::vec((1i64..300, 0i64..60), 0..12),
            start in 1i64..300,
            len in 1i64..120,
            tolerance in 0i64..40,
        ) {
            let mut builder = FeatureIndexBuilder::new();
            let mut mask = vec![false; 500];
            for &(fstart, flen) in &features {
                builder.insert(Partition::Filter, &SeqInterval::new("c", fstart, fstart + flen), "f");
                for p in fstart..=fstart + flen {
                    mask[p as usize] = true;
                }
            }
            let index = builder.build();

            let end = start + len - 1;
            let covered = (start..=end).filter(|&p| mask[p as usize]).count() as i64;
            prop_assert_eq!(
                index.within(Partition::Filter, "c", start, end, tolerance),
                len - covered <= tolerance
            );
        }
    }
}
