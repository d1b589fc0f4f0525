//! Record-level plumbing shared by the grouping pipeline.
//!
//! - [`record`]: owned alignment records, headers and the source traits
//! - [`bam`]: noodles-backed BAM source
//! - [`merge`]: k-way merge of sorted sources
//! - [`read_filter`]: per-read discard checks

pub mod bam;
pub mod merge;
pub mod read_filter;
pub mod record;

pub use bam::BamSource;
pub use merge::{merge_headers, StreamMerger};
pub use read_filter::{DefaultReadFilter, Discard, ReadFilter};
pub use record::{
    AlignmentHeader, AlignmentRecord, AlignmentSource, ReadGroup, RecordStream, ReferenceSequence,
    Strand, VecSource,
};
