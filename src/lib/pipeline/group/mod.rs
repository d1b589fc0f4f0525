//! Discordant read-pair grouping.
//!
//! # Key Components
//!
//! - [`read_group`]: read group to sample and maximum-insert lookup
//! - [`feature`]: ignore, repeat and transposon feature partitions
//! - [`interval`]: projected breakpoint ranges
//! - [`rearrangement`]: groups and the active-group collection
//! - [`grouper`]: the sorted scan that builds groups
//! - [`report`]: report preamble, group lines and trailer

pub mod feature;
pub mod grouper;
pub mod interval;
pub mod read_group;
pub mod rearrangement;
pub mod report;

pub use feature::{FeatureIndex, FeatureIndexBuilder, Partition, SeqInterval};
pub use grouper::{DiscardCondition, DiscardToggles, GroupOptions, Grouper};
pub use interval::Interval;
pub use read_group::{ReadGroupInfo, ReadGroupRegistry};
pub use rearrangement::{GroupCollection, RearrangementGroup, SampleEvidence};
pub use report::{GroupStats, ReadStats, ReportWriter};
