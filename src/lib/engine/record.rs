//! Owned alignment records and header metadata.
//!
//! Format decoding lives behind [`AlignmentSource`]; everything downstream of
//! the stream merge works on these plain types. Positions are 1-based, with
//! `0` meaning "no position", and contig indices are `-1` when absent.

use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::core::error::Result;

pub const FLAG_PAIRED: u16 = 0x1;
pub const FLAG_PROPER_PAIR: u16 = 0x2;
pub const FLAG_UNMAPPED: u16 = 0x4;
pub const FLAG_MATE_UNMAPPED: u16 = 0x8;
pub const FLAG_REVERSE: u16 = 0x10;
pub const FLAG_MATE_REVERSE: u16 = 0x20;
pub const FLAG_FIRST_IN_PAIR: u16 = 0x40;
pub const FLAG_SECOND_IN_PAIR: u16 = 0x80;

/// Alignment strand of one end of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    #[inline]
    pub fn from_reverse_flag(reverse: bool) -> Self {
        if reverse {
            Strand::Reverse
        } else {
            Strand::Forward
        }
    }

    #[inline]
    pub fn symbol(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlignmentRecord {
    pub name: String,
    pub ref_id: i32,
    /// 1-based leftmost position.
    pub pos: i64,
    pub flag: u16,
    pub mapq: u8,
    /// Query sequence length.
    pub length: i64,
    pub mate_ref_id: i32,
    pub mate_pos: i64,
    pub tlen: i64,
    /// Value of the `RG` tag.
    pub read_group: Option<String>,
    /// Value of the `XT` character tag.
    pub xt: Option<u8>,
}

impl Default for AlignmentRecord {
    fn default() -> Self {
        AlignmentRecord {
            name: String::new(),
            ref_id: -1,
            pos: 0,
            flag: 0,
            mapq: 0,
            length: 0,
            mate_ref_id: -1,
            mate_pos: 0,
            tlen: 0,
            read_group: None,
            xt: None,
        }
    }
}

impl AlignmentRecord {
    #[inline]
    pub fn has_flag(&self, bits: u16) -> bool {
        self.flag & bits != 0
    }

    #[inline]
    pub fn strand(&self) -> Strand {
        Strand::from_reverse_flag(self.has_flag(FLAG_REVERSE))
    }

    #[inline]
    pub fn mate_strand(&self) -> Strand {
        Strand::from_reverse_flag(self.has_flag(FLAG_MATE_REVERSE))
    }

    /// 0-based leftmost position.
    #[inline]
    pub fn zpos(&self) -> i64 {
        self.pos - 1
    }

    #[inline]
    pub fn mate_zpos(&self) -> i64 {
        self.mate_pos - 1
    }

    /// Key used to order records within and across sorted streams.
    /// Records without a contig sort after every placed record.
    #[inline]
    pub fn sort_key(&self) -> (u32, i64) {
        let tid = if self.ref_id < 0 {
            u32::MAX
        } else {
            self.ref_id as u32
        };
        (tid, self.pos)
    }

    /// Whether this read sorts before its mate, so that exactly one read of
    /// each pair is selected. Ties on location fall back to the first-in-pair
    /// flag.
    pub fn less_than_mate(&self) -> bool {
        match self.ref_id.cmp(&self.mate_ref_id) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => match self.pos.cmp(&self.mate_pos) {
                Ordering::Less => true,
                Ordering::Greater => false,
                Ordering::Equal => self.has_flag(FLAG_FIRST_IN_PAIR),
            },
        }
    }

    /// Forward read with a reverse mate, the expected orientation for
    /// short-insert paired-end libraries.
    #[inline]
    pub fn natural_orientation(&self) -> bool {
        self.flag & (FLAG_REVERSE | FLAG_MATE_REVERSE) == FLAG_MATE_REVERSE
    }
}

/// One `@SQ` header entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSequence {
    pub name: String,
    pub length: i64,
    /// Remaining fields (`AS`, `SP`, `UR`, `M5`, ...) in header order.
    pub fields: Vec<(String, String)>,
}

impl ReferenceSequence {
    pub fn new<S: Into<String>>(name: S, length: i64) -> Self {
        Self {
            name: name.into(),
            length,
            fields: Vec::new(),
        }
    }

    pub fn with_field<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// One `@RG` header entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadGroup {
    pub id: String,
    pub fields: Vec<(String, String)>,
}

impl ReadGroup {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn sample(&self) -> Option<&str> {
        self.field("SM")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignmentHeader {
    pub references: Vec<ReferenceSequence>,
    pub read_groups: Vec<ReadGroup>,
}

impl AlignmentHeader {
    pub fn reference_name(&self, tid: usize) -> &str {
        &self.references[tid].name
    }

    pub fn read_group(&self, id: &str) -> Option<&ReadGroup> {
        self.read_groups.iter().find(|rg| rg.id == id)
    }
}

/// A stream of alignment records, pulled one at a time.
pub trait RecordStream {
    /// Return the next record, or `None` at end of input.
    fn next_record(&mut self) -> Result<Option<AlignmentRecord>>;
}

/// A coordinate-sorted alignment input with its header.
pub trait AlignmentSource: RecordStream {
    fn header(&self) -> &AlignmentHeader;

    /// Name used in diagnostics and the report preamble.
    fn filename(&self) -> &str;
}

/// In-memory [`AlignmentSource`], handy for tests and for piping records
/// produced by other tools.
#[derive(Debug, Clone)]
pub struct VecSource {
    name: String,
    header: AlignmentHeader,
    records: VecDeque<AlignmentRecord>,
}

impl VecSource {
    pub fn new<S: Into<String>>(name: S, header: AlignmentHeader, records: Vec<AlignmentRecord>) -> Self {
        Self {
            name: name.into(),
            header,
            records: records.into(),
        }
    }
}

impl RecordStream for VecSource {
    fn next_record(&mut self) -> Result<Option<AlignmentRecord>> {
        Ok(self.records.pop_front())
    }
}

impl AlignmentSource for VecSource {
    fn header(&self) -> &AlignmentHeader {
        &self.header
    }

    fn filename(&self) -> &str {
        &self.name
    }
}
