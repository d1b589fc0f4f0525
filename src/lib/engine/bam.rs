//! BAM input backed by noodles.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use noodles::sam::alignment::record::data::field::{Tag, Value};
use noodles::{bam, bgzf, sam};

use crate::core::error::{GroupError, Result};
use crate::engine::record::{
    AlignmentHeader, AlignmentRecord, AlignmentSource, ReadGroup, RecordStream, ReferenceSequence,
};

type BamReader = bam::io::Reader<bgzf::Reader<BufReader<File>>>;

const READ_GROUP_TAG: [u8; 2] = *b"RG";
const XT_TAG: [u8; 2] = *b"XT";

/// Sequential reader over a coordinate-sorted BAM file.
pub struct BamSource {
    path: String,
    reader: BamReader,
    header: AlignmentHeader,
    record: bam::Record,
}

impl BamSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().display().to_string();
        let file = File::open(path.as_ref()).map_err(|source| GroupError::Bam {
            path: path_str.clone(),
            source,
        })?;
        let mut reader = bam::io::Reader::new(BufReader::new(file));
        let sam_header = reader.read_header().map_err(|source| GroupError::Bam {
            path: path_str.clone(),
            source,
        })?;

        Ok(Self {
            path: path_str,
            reader,
            header: convert_header(&sam_header),
            record: bam::Record::default(),
        })
    }

    fn bam_error(&self, source: io::Error) -> GroupError {
        GroupError::Bam {
            path: self.path.clone(),
            source,
        }
    }
}

impl RecordStream for BamSource {
    fn next_record(&mut self) -> Result<Option<AlignmentRecord>> {
        let n = match self.reader.read_record(&mut self.record) {
            Ok(n) => n,
            Err(err) => return Err(self.bam_error(err)),
        };
        if n == 0 {
            return Ok(None);
        }
        decode_bam_record(&self.record)
            .map(Some)
            .map_err(|err| self.bam_error(err))
    }
}

impl AlignmentSource for BamSource {
    fn header(&self) -> &AlignmentHeader {
        &self.header
    }

    fn filename(&self) -> &str {
        &self.path
    }
}

fn convert_header(header: &sam::Header) -> AlignmentHeader {
    let references = header
        .reference_sequences()
        .iter()
        .map(|(name, map)| {
            let mut reference = ReferenceSequence::new(
                String::from_utf8_lossy(name).into_owned(),
                map.length().get() as i64,
            );
            for (tag, value) in map.other_fields().iter() {
                reference.fields.push((
                    String::from_utf8_lossy(tag.as_ref()).into_owned(),
                    String::from_utf8_lossy(value).into_owned(),
                ));
            }
            reference
        })
        .collect();

    let read_groups = header
        .read_groups()
        .iter()
        .map(|(id, map)| {
            let mut read_group = ReadGroup::new(String::from_utf8_lossy(id).into_owned());
            for (tag, value) in map.other_fields().iter() {
                read_group.fields.push((
                    String::from_utf8_lossy(tag.as_ref()).into_owned(),
                    String::from_utf8_lossy(value).into_owned(),
                ));
            }
            read_group
        })
        .collect();

    AlignmentHeader {
        references,
        read_groups,
    }
}

fn decode_bam_record(rec: &bam::Record) -> io::Result<AlignmentRecord> {
    let name = rec
        .name()
        .map(|n| String::from_utf8_lossy(n.as_ref()).into_owned())
        .unwrap_or_default();

    let ref_id = match rec.reference_sequence_id() {
        Some(Ok(id)) => id as i32,
        Some(Err(e)) => return Err(e),
        None => -1,
    };
    let pos = match rec.alignment_start() {
        Some(Ok(p)) => p.get() as i64,
        Some(Err(e)) => return Err(e),
        None => 0,
    };
    let mate_ref_id = match rec.mate_reference_sequence_id() {
        Some(Ok(id)) => id as i32,
        Some(Err(e)) => return Err(e),
        None => -1,
    };
    let mate_pos = match rec.mate_alignment_start() {
        Some(Ok(p)) => p.get() as i64,
        Some(Err(e)) => return Err(e),
        None => 0,
    };
    let mapq = match rec.mapping_quality() {
        Some(q) => q.get(),
        None => 255,
    };

    let data = rec.data();
    let read_group = match data.get(&Tag::from(READ_GROUP_TAG)) {
        Some(Ok(Value::String(value))) => Some(String::from_utf8_lossy(value.as_ref()).into_owned()),
        Some(Err(e)) => return Err(e),
        _ => None,
    };
    let xt = match data.get(&Tag::from(XT_TAG)) {
        Some(Ok(Value::Character(c))) => Some(c),
        Some(Err(e)) => return Err(e),
        _ => None,
    };

    Ok(AlignmentRecord {
        name,
        ref_id,
        pos,
        flag: rec.flags().bits(),
        mapq,
        length: rec.sequence().len() as i64,
        mate_ref_id,
        mate_pos,
        tlen: i64::from(rec.template_length()),
        read_group,
        xt,
    })
}
