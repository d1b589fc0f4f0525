//! K-way merge of coordinate-sorted alignment streams.
//!
//! Each input is independently sorted by (contig, position). The merger keeps
//! the front record of every input in a min-heap and always yields the
//! smallest, breaking ties by input order so the output is deterministic.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use log::debug;

use crate::core::error::{GroupError, Result};
use crate::engine::record::{AlignmentHeader, AlignmentRecord, AlignmentSource, RecordStream};

struct Front {
    key: (u32, i64),
    source: usize,
    record: AlignmentRecord,
}

impl PartialEq for Front {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Front {}

impl PartialOrd for Front {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Front {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.key, self.source).cmp(&(other.key, other.source))
    }
}

/// Merge headers of several inputs into one.
///
/// All inputs must share the same reference sequence dictionary. Read groups
/// are unioned; on an id collision the first occurrence wins.
pub fn merge_headers<'a, I>(headers: I) -> Result<AlignmentHeader>
where
    I: IntoIterator<Item = (&'a str, &'a AlignmentHeader)>,
{
    let mut iter = headers.into_iter();
    let (_, first) = iter
        .next()
        .ok_or_else(|| GroupError::Config("no alignment inputs given".to_string()))?;
    let mut merged = first.clone();

    for (filename, header) in iter {
        if header.references.len() != merged.references.len() {
            return Err(GroupError::HeaderMismatch(format!(
                "{} has {} reference sequences, expected {}",
                filename,
                header.references.len(),
                merged.references.len()
            )));
        }
        for (ours, theirs) in merged.references.iter().zip(header.references.iter()) {
            if ours.name != theirs.name || ours.length != theirs.length {
                return Err(GroupError::HeaderMismatch(format!(
                    "{} has a differing reference ({}:{} vs {}:{})",
                    filename, theirs.name, theirs.length, ours.name, ours.length
                )));
            }
        }
        for read_group in &header.read_groups {
            if merged.read_group(&read_group.id).is_none() {
                merged.read_groups.push(read_group.clone());
            } else {
                debug!(
                    "Read group {} from {} already present; keeping first",
                    read_group.id, filename
                );
            }
        }
    }

    Ok(merged)
}

/// Ordered union of any number of sorted [`AlignmentSource`]s.
pub struct StreamMerger<S: AlignmentSource> {
    sources: Vec<S>,
    fronts: BinaryHeap<Reverse<Front>>,
    last_keys: Vec<Option<(u32, i64)>>,
    header: AlignmentHeader,
}

impl<S: AlignmentSource> StreamMerger<S> {
    pub fn new(sources: Vec<S>) -> Result<Self> {
        let header = merge_headers(sources.iter().map(|s| (s.filename(), s.header())))?;
        let n = sources.len();
        let mut merger = Self {
            sources,
            fronts: BinaryHeap::with_capacity(n),
            last_keys: vec![None; n],
            header,
        };
        for i in 0..n {
            merger.pull(i)?;
        }
        Ok(merger)
    }

    pub fn header(&self) -> &AlignmentHeader {
        &self.header
    }

    pub fn filenames(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.filename()).collect()
    }

    /// Fetch the next record of input `i` onto the heap.
    fn pull(&mut self, i: usize) -> Result<()> {
        if let Some(record) = self.sources[i].next_record()? {
            let key = record.sort_key();
            if let Some(last) = self.last_keys[i] {
                if key < last {
                    return Err(GroupError::UnsortedInput {
                        path: self.sources[i].filename().to_string(),
                        read: record.name,
                    });
                }
            }
            self.last_keys[i] = Some(key);
            self.fronts.push(Reverse(Front {
                key,
                source: i,
                record,
            }));
        }
        Ok(())
    }
}

impl<S: AlignmentSource> RecordStream for StreamMerger<S> {
    fn next_record(&mut self) -> Result<Option<AlignmentRecord>> {
        match self.fronts.pop() {
            Some(Reverse(front)) => {
                self.pull(front.source)?;
                Ok(Some(front.record))
            }
            None => Ok(None),
        }
    }
}
