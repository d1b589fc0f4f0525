//! Rearrangement groups and the active-group collection.

use crate::engine::record::{AlignmentRecord, Strand};
use crate::pipeline::group::interval::Interval;
use crate::pipeline::group::read_group::ReadGroupInfo;

/// Pairs contributed by one sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleEvidence {
    pub count: u32,
    /// Read names joined by `;`.
    pub read_names: String,
}

/// A cluster of read pairs supporting the same candidate rearrangement.
///
/// The overlap intervals are the intersection of every member pair's
/// projected intervals, so they only ever shrink.
#[derive(Debug, Clone)]
pub struct RearrangementGroup {
    /// First pair admitted; fixes contigs and strands for the group.
    pub canonical: AlignmentRecord,
    pub overlap_l: Interval,
    pub overlap_h: Interval,
    pub max_insert: i64,
    pub samples: Vec<SampleEvidence>,
    pub total_count: u32,
    pub notes: Option<String>,
}

impl RearrangementGroup {
    pub fn new(
        record: AlignmentRecord,
        low: Interval,
        high: Interval,
        info: &ReadGroupInfo,
        sample_count: usize,
    ) -> Self {
        let mut samples = vec![SampleEvidence::default(); sample_count];
        samples[info.sample_index] = SampleEvidence {
            count: 1,
            read_names: record.name.clone(),
        };
        Self {
            canonical: record,
            overlap_l: low,
            overlap_h: high,
            max_insert: info.max_insert,
            samples,
            total_count: 1,
            notes: None,
        }
    }

    #[inline]
    pub fn ref_id(&self) -> i32 {
        self.canonical.ref_id
    }

    #[inline]
    pub fn mate_ref_id(&self) -> i32 {
        self.canonical.mate_ref_id
    }

    #[inline]
    pub fn strand(&self) -> Strand {
        self.canonical.strand()
    }

    #[inline]
    pub fn mate_strand(&self) -> Strand {
        self.canonical.mate_strand()
    }

    /// Whether `record` has the group's orientation and both of its
    /// projected intervals meet the group's overlaps.
    pub fn matches(&self, record: &AlignmentRecord, low: &Interval, high: &Interval) -> bool {
        record.strand() == self.strand()
            && record.mate_strand() == self.mate_strand()
            && self.overlap_l.intersects(low)
            && self.overlap_h.intersects(high)
    }

    /// A group whose low overlap ends at or before `low` starts, on the same
    /// strand, cannot match any later pair of a sorted scan.
    #[inline]
    pub fn expired_by(&self, record: &AlignmentRecord, low: &Interval) -> bool {
        self.overlap_l.pos3 <= low.pos5 && self.strand() == record.strand()
    }

    /// Add a matching pair, narrowing the overlaps.
    pub fn insert(&mut self, record: &AlignmentRecord, low: &Interval, high: &Interval, info: &ReadGroupInfo) {
        debug_assert!(
            record.ref_id == self.ref_id() && record.mate_ref_id == self.mate_ref_id(),
            "inserted pair does not match group"
        );
        self.overlap_l.intersect_assign(low);
        self.overlap_h.intersect_assign(high);
        self.max_insert = self.max_insert.max(info.max_insert);

        let sample = &mut self.samples[info.sample_index];
        if !sample.read_names.is_empty() {
            sample.read_names.push(';');
        }
        sample.read_names.push_str(&record.name);
        sample.count += 1;
        self.total_count += 1;
    }
}

/// Active groups, bucketed by the contig of the pair's higher end.
#[derive(Debug, Default)]
pub struct GroupCollection {
    buckets: Vec<Vec<RearrangementGroup>>,
    contig: Option<i32>,
}

impl GroupCollection {
    pub fn new(reference_count: usize) -> Self {
        Self {
            buckets: (0..reference_count).map(|_| Vec::new()).collect(),
            contig: None,
        }
    }

    /// Contig of the most recently created group, `None` once cleared.
    #[inline]
    pub fn contig(&self) -> Option<i32> {
        self.contig
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    /// Groups whose mate contig is `mate_ref_id`, in creation order.
    pub fn bucket_mut(&mut self, mate_ref_id: i32) -> &mut Vec<RearrangementGroup> {
        &mut self.buckets[mate_ref_id as usize]
    }

    pub fn push(&mut self, group: RearrangementGroup) {
        self.contig = Some(group.ref_id());
        let mate = group.mate_ref_id() as usize;
        self.buckets[mate].push(group);
    }

    /// Remove every group, in mate-contig then creation order.
    pub fn drain_all(&mut self) -> Vec<RearrangementGroup> {
        self.contig = None;
        let mut drained = Vec::with_capacity(self.len());
        for bucket in self.buckets.iter_mut() {
            drained.append(bucket);
        }
        drained
    }
}
