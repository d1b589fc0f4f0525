//! Per-read discard filters.
//!
//! The [`ReadFilter`] trait classifies a record as kept or discarded for a
//! given [`Discard`] reason. [`DefaultReadFilter`] implements the flag,
//! mapping-quality and mate-distance checks that every discordant-pair scan
//! applies before consulting any feature index.

use std::fmt;

use crate::engine::record::{
    AlignmentRecord, FLAG_MATE_UNMAPPED, FLAG_PROPER_PAIR, FLAG_UNMAPPED,
};

/// Reads closer than this to their mate (0-based start to start) are
/// treated as uninformative.
pub const NEAR_MATE_DISTANCE: i64 = 10;

/// Why a read was dropped before clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    ProperPair,
    Unmapped,
    LowQuality,
    NearMate,
    Repeats,
    Repetitive,
    Ignored,
    Insertion,
}

impl fmt::Display for Discard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Discard::ProperPair => "proper",
            Discard::Unmapped => "unmapped",
            Discard::LowQuality => "low_quality",
            Discard::NearMate => "near_mate",
            Discard::Repeats => "repeats",
            Discard::Repetitive => "repetitive",
            Discard::Ignored => "ignored",
            Discard::Insertion => "insertion",
        };
        f.write_str(label)
    }
}

/// A trait for filtering reads based on various criteria.
pub trait ReadFilter {
    /// Return the reason `read` is discarded, or `None` if it passes.
    fn filter_read(&self, read: &AlignmentRecord) -> Option<Discard>;
}

/// Flag, mapping quality and mate-distance filter.
///
/// Checks run in a fixed order and the first failing one wins:
/// properly paired, (half-)unmapped, low quality, near mate.
pub struct DefaultReadFilter {
    /// Reads with a mapping quality below this value are discarded.
    min_mapq: u8,
}

impl DefaultReadFilter {
    pub fn new(min_mapq: u8) -> Self {
        Self { min_mapq }
    }
}

impl ReadFilter for DefaultReadFilter {
    #[inline(always)]
    fn filter_read(&self, read: &AlignmentRecord) -> Option<Discard> {
        if read.has_flag(FLAG_PROPER_PAIR) {
            return Some(Discard::ProperPair);
        }
        if read.has_flag(FLAG_UNMAPPED | FLAG_MATE_UNMAPPED) || read.ref_id < 0 || read.mate_ref_id < 0 {
            return Some(Discard::Unmapped);
        }
        if read.mapq < self.min_mapq {
            return Some(Discard::LowQuality);
        }
        if (read.zpos() - read.mate_zpos()).abs() < NEAR_MATE_DISTANCE {
            return Some(Discard::NearMate);
        }
        None
    }
}
