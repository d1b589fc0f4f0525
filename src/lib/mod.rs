//! rearrgroup: clustering of discordant read pairs into candidate rearrangements
//!
//! The library reads one or more coordinate-sorted alignment files, drops
//! pairs that are uninformative or lie in listed repeat or ignored regions,
//! and clusters the remaining pairs whose projected breakpoint ranges agree.
//!
//! # Modules
//!
//! The main modules are:
//! - [`core`]: errors, interning and file helpers
//! - [`engine`]: alignment records, BAM input, stream merging and read filters
//! - [`pipeline`]: the grouping scan, feature index and report writer

pub mod core;
pub mod engine;
pub mod pipeline;

pub mod prelude {
    pub use crate::core::prelude::*;
    pub use crate::engine::{AlignmentHeader, AlignmentSource, BamSource, RecordStream, StreamMerger};
    pub use crate::pipeline::prelude::*;
}
